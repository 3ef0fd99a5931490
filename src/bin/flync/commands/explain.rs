//! `flync explain` command

use anyhow::{anyhow, bail, Result};

use crate::cli::ExplainArgs;
use crate::commands::{expected_name, workspace_config};
use flync::core::model::Entity;
use flync::{EntityKey, EntityKind, Loader, Location};

pub fn execute(args: ExplainArgs) -> Result<i32> {
    let kind: EntityKind = args.kind.parse().map_err(|e: String| anyhow!(e))?;
    let config = workspace_config(&args.path);
    let name = expected_name(&args.path, args.name)?;

    let ws = Loader::new(config.load).load(&name, &args.path)?;

    let key = EntityKey::new(kind, &args.entity);
    let Some(record) = ws.get(&key) else {
        let known: Vec<&str> = ws
            .objects(kind)
            .iter()
            .map(|r| r.key.name.as_str())
            .collect();
        if known.is_empty() {
            bail!("no {} named `{}` in workspace `{}`", kind.label(), args.entity, ws.name());
        }
        bail!(
            "no {} named `{}` in workspace `{}`\n\
             help: Known {} names: {}",
            kind.label(),
            args.entity,
            ws.name(),
            kind.label(),
            known.join(", ")
        );
    };

    println!("{} `{}`", kind.label(), record.key.name);
    println!("  declared at: {}", record.location);
    if let Some(detail) = detail(&record.entity) {
        println!("  {}", detail);
    }

    print_keys("Refers to", ws.dependencies(&key), |dep| ws.source(dep));
    print_keys("Referenced by", ws.reverse_deps(&key), |dependent| {
        ws.reference_site(dependent, &key)
    });

    if ws.has_errors() {
        eprintln!(
            "warning: workspace `{}` has {} errors; run `flync validate` for details",
            ws.name(),
            ws.errors().count()
        );
    }
    Ok(0)
}

/// List entities, each with the location `locate` gives for it.
fn print_keys<'a>(
    title: &str,
    keys: Vec<&'a EntityKey>,
    locate: impl Fn(&'a EntityKey) -> Option<&'a Location>,
) {
    if keys.is_empty() {
        return;
    }
    println!();
    println!("{}:", title);
    for key in keys {
        match locate(key) {
            Some(location) => println!("  → {} `{}` ({})", key.kind.label(), key.name, location),
            None => println!("  → {} `{}`", key.kind.label(), key.name),
        }
    }
}

/// One line of kind-specific detail.
fn detail(entity: &Entity) -> Option<String> {
    match entity {
        Entity::Ecu(ecu) => Some(match &ecu.metadata {
            Some(meta) => format!("author: {}", meta.author),
            None => "no valid ECU metadata".to_string(),
        }),
        Entity::ServiceInterface(service) => Some(format!(
            "service id: {} (0x{:04x}), {} events, {} eventgroups",
            service.id,
            service.id,
            service.events.len(),
            service.eventgroups.len()
        )),
        Entity::Connection(connection) => Some(format!("declared by ECU `{}`", connection.ecu)),
        Entity::ControllerInterface(interface) => Some(format!("mac address: {}", interface.mac_address)),
        Entity::Socket(socket) => Some(format!(
            "endpoint: {}:{} ({:?})",
            socket.endpoint_address, socket.port_no, socket.protocol
        )),
        _ => None,
    }
}
