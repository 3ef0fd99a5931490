//! SOME/IP service interfaces (`general/someip/services/*.flync.yaml`).

use std::collections::HashMap;

use serde::Serialize;
use serde_yaml::Value;

use crate::builder::discriminator::{Discriminator, Variant};
use crate::builder::reader::{BuildErrors, FromNode, MapReader};
use crate::core::location::FieldPath;
use crate::core::model::payload::{unique_parameter_names, Datatype, Parameter};
use crate::util::diagnostic::{Diagnostic, DiagnosticKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub name: String,
    pub id: u16,
    pub parameters: Vec<Datatype>,
}

impl FromNode for Event {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        let mut map = MapReader::open(node, path, errs)?;
        let name = map.required::<String>("name", errs);
        let id = map.required::<u16>("id", errs);
        let parameters = map.optional::<Vec<Datatype>>("parameters", errs);
        map.finish(errs)?;
        Some(Event {
            name: name?,
            id: id?,
            parameters: parameters.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Method {
    FireAndForget {
        name: String,
        id: u16,
        input_parameters: Vec<Parameter>,
    },
    RequestResponse {
        name: String,
        id: u16,
        input_parameters: Vec<Parameter>,
        /// At least one; a call without a result is fire-and-forget
        output_parameters: Vec<Parameter>,
    },
}

impl Method {
    pub fn name(&self) -> &str {
        match self {
            Method::FireAndForget { name, .. } | Method::RequestResponse { name, .. } => name,
        }
    }

    pub fn id(&self) -> u16 {
        match self {
            Method::FireAndForget { id, .. } | Method::RequestResponse { id, .. } => *id,
        }
    }
}

fn parameters(map: &mut MapReader<'_>, key: &'static str, errs: &mut BuildErrors) -> Option<Vec<Parameter>> {
    let path = map.field(key);
    let params = map.optional::<Vec<Parameter>>(key, errs).unwrap_or_default();
    let before = errs.error_count();
    unique_parameter_names(&params, &path, errs);
    (errs.error_count() == before).then_some(params)
}

fn fire_and_forget(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Method> {
    let mut map = MapReader::open(node, path, errs)?;
    let name = map.required::<String>("name", errs);
    let id = map.required::<u16>("id", errs);
    let input_parameters = parameters(&mut map, "input_parameters", errs);
    map.finish(errs)?;
    Some(Method::FireAndForget {
        name: name?,
        id: id?,
        input_parameters: input_parameters?,
    })
}

fn request_response(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Method> {
    let mut map = MapReader::open(node, path, errs)?;
    let name = map.required::<String>("name", errs);
    let id = map.required::<u16>("id", errs);
    let input_parameters = parameters(&mut map, "input_parameters", errs);
    let outputs_path = map.field("output_parameters");
    if map.get("output_parameters").is_none() {
        errs.error(DiagnosticKind::Missing, &outputs_path, "Field required");
    }
    let output_parameters = parameters(&mut map, "output_parameters", errs);
    map.finish(errs)?;

    let output_parameters = output_parameters?;
    if output_parameters.is_empty() {
        errs.error(
            DiagnosticKind::ValueError,
            &outputs_path,
            "List should have at least 1 item after validation, not 0",
        );
        return None;
    }
    Some(Method::RequestResponse {
        name: name?,
        id: id?,
        input_parameters: input_parameters?,
        output_parameters,
    })
}

pub const METHOD: Discriminator<Method> = Discriminator {
    subject: "SOME/IP method",
    tag_field: "type",
    variants: &[
        Variant {
            tag: "fire_and_forget",
            build: fire_and_forget,
        },
        Variant {
            tag: "request_response",
            build: request_response,
        },
    ],
};

impl FromNode for Method {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        METHOD.resolve(node, path, errs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Eventgroup {
    pub name: String,
    pub id: u16,
    /// Names of events of the same service
    pub events: Vec<String>,
}

impl FromNode for Eventgroup {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        let mut map = MapReader::open(node, path, errs)?;
        let name = map.required::<String>("name", errs);
        let id = map.required::<u16>("id", errs);
        let events = map.optional::<Vec<String>>("events", errs);
        map.finish(errs)?;
        Some(Eventgroup {
            name: name?,
            id: id?,
            events: events.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceInterface {
    pub name: String,
    /// Service id, unique across the workspace
    pub id: u16,
    pub events: Vec<Event>,
    pub eventgroups: Vec<Eventgroup>,
    pub methods: Vec<Method>,
}

impl ServiceInterface {
    pub fn eventgroup(&self, name: &str) -> Option<&Eventgroup> {
        self.eventgroups.iter().find(|g| g.name == name)
    }
}

impl FromNode for ServiceInterface {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        let mut map = MapReader::open(node, path, errs)?;
        let name = map.required::<String>("name", errs);
        let id = map.required::<u16>("id", errs);
        let events = map.optional::<Vec<Event>>("events", errs);
        let eventgroups = map.optional::<Vec<Eventgroup>>("eventgroups", errs);
        let methods = map.optional::<Vec<Method>>("methods", errs);
        map.finish(errs)?;

        let (events, eventgroups) = (events.unwrap_or_default(), eventgroups.unwrap_or_default());
        let methods = methods.unwrap_or_default();
        let before = errs.error_count();

        unique_ids(events.iter().map(|e| e.id), &path.key("events"), "event", errs);
        unique_ids(eventgroups.iter().map(|g| g.id), &path.key("eventgroups"), "eventgroup", errs);
        unique_ids(methods.iter().map(Method::id), &path.key("methods"), "method", errs);

        for (i, group) in eventgroups.iter().enumerate() {
            for (j, member) in group.events.iter().enumerate() {
                if !events.iter().any(|e| &e.name == member) {
                    errs.report(
                        &path.key("eventgroups").index(i).key("events").index(j),
                        Diagnostic::error(
                            DiagnosticKind::InvariantViolation,
                            format!("eventgroup `{}` lists unknown event `{}`", group.name, member),
                        ),
                    );
                }
            }
        }
        (errs.error_count() == before).then_some(())?;

        for (i, event) in events.iter().enumerate() {
            if !eventgroups.iter().any(|g| g.events.contains(&event.name)) {
                errs.warning(
                    DiagnosticKind::UnassignedEvent,
                    &path.key("events").index(i),
                    format!("Event `{}` is not assigned to an eventgroup", event.name),
                );
            }
        }

        Some(ServiceInterface {
            name: name?,
            id: id?,
            events,
            eventgroups,
            methods,
        })
    }
}

fn unique_ids(ids: impl Iterator<Item = u16>, list: &FieldPath, what: &str, errs: &mut BuildErrors) {
    let mut seen: HashMap<u16, usize> = HashMap::new();
    for (i, id) in ids.enumerate() {
        if let Some(&first) = seen.get(&id) {
            errs.report(
                &list.index(i).key("id"),
                Diagnostic::error(
                    DiagnosticKind::InvariantViolation,
                    format!("{} id {} is declared more than once", what, id),
                )
                .with_context("first declared at", list.index(first).to_string()),
            );
        } else {
            seen.insert(id, i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVICE: &str = "\
name: ets
id: 257
events:
  - {name: a, id: 1}
  - {name: b, id: 2}
eventgroups:
  - {name: eg_e1, id: 1, events: [a]}
  - {name: eg_e2, id: 2, events: [b]}
";

    fn service(text: &str) -> (Option<ServiceInterface>, BuildErrors) {
        let mut errs = BuildErrors::new("general/someip/services/ets.flync.yaml");
        let node: Value = serde_yaml::from_str(text).unwrap();
        let s = ServiceInterface::from_node(&node, &FieldPath::root(), &mut errs);
        (s, errs)
    }

    #[test]
    fn test_service() {
        let (s, errs) = service(SERVICE);
        assert!(errs.diagnostics().is_empty());
        let s = s.unwrap();
        assert_eq!(s.id, 257);
        assert!(s.eventgroup("eg_e2").is_some());
    }

    #[test]
    fn test_unassigned_event_is_a_warning() {
        let (s, errs) = service(&SERVICE.replace("events: [b]", "events: []"));
        assert!(s.is_some());
        assert_eq!(errs.diagnostics().len(), 1);
        let diag = &errs.diagnostics()[0];
        assert!(!diag.is_error());
        assert!(diag.message.contains("not assigned to an eventgroup"));
        assert_eq!(diag.location.field.to_string(), "events.1");
    }

    #[test]
    fn test_eventgroup_must_name_known_events() {
        let (s, errs) = service(&SERVICE.replace("events: [b]", "events: [c]"));
        assert!(s.is_none());
        assert_eq!(
            errs.diagnostics()[0].location.field.to_string(),
            "eventgroups.1.events.0"
        );
    }

    const METHODS: &str = "\
methods:
  - type: fire_and_forget
    name: set_mode
    id: 1
    input_parameters:
      - {name: p1, datatype: {type: uint8}}
  - type: request_response
    name: get_mode
    id: 2
    input_parameters: []
    output_parameters:
      - name: p1
        datatype: {name: STRUCT, members: [{type: uint16, endianness: LE}]}
";

    #[test]
    fn test_methods() {
        let (s, errs) = service(&format!("{}{}", SERVICE, METHODS));
        assert!(errs.diagnostics().is_empty(), "{:?}", errs.diagnostics());
        let s = s.unwrap();
        assert_eq!(s.methods.len(), 2);
        assert!(matches!(&s.methods[0], Method::FireAndForget { input_parameters, .. } if input_parameters.len() == 1));
        assert_eq!(s.methods[1].name(), "get_mode");
    }

    #[test]
    fn test_request_response_needs_output() {
        let text = format!("{}{}", SERVICE, METHODS).replace(
            "    output_parameters:\n      - name: p1\n        datatype: {name: STRUCT, members: [{type: uint16, endianness: LE}]}\n",
            "    output_parameters: []\n",
        );
        let (s, errs) = service(&text);
        assert!(s.is_none());
        let diag = &errs.diagnostics()[0];
        assert_eq!(diag.kind, DiagnosticKind::NoVariantMatched);
        assert_eq!(diag.location.field.to_string(), "methods.1");
    }

    #[test]
    fn test_untagged_method_by_shape() {
        let text = format!("{}{}", SERVICE, METHODS)
            .replace("  - type: fire_and_forget\n    name", "  - name")
            .replace("  - type: request_response\n    name", "  - name");
        let (s, errs) = service(&text);
        assert!(errs.diagnostics().is_empty(), "{:?}", errs.diagnostics());
        assert!(matches!(s.unwrap().methods[1], Method::RequestResponse { .. }));
    }

    #[test]
    fn test_missing_method_type_tag() {
        let text = format!("{}{}", SERVICE, METHODS).replace("type: fire_and_forget", "type: null");
        let (_, errs) = service(&text);
        let diag = &errs.diagnostics()[0];
        assert_eq!(diag.kind, DiagnosticKind::LiteralError);
        assert_eq!(diag.location.field.to_string(), "methods.0.type");
    }

    #[test]
    fn test_duplicate_method_id() {
        let text = format!("{}{}", SERVICE, METHODS).replace("id: 2\n    input", "id: 1\n    input");
        let (s, errs) = service(&text);
        assert!(s.is_none());
        assert_eq!(errs.diagnostics()[0].location.field.to_string(), "methods.1.id");
    }

    #[test]
    fn test_event_parameters() {
        let (s, errs) = service(&SERVICE.replace("{name: a, id: 1}", "{name: a, id: 1, parameters: [{name: p1, type: uint8}]}"));
        assert!(errs.diagnostics().is_empty(), "{:?}", errs.diagnostics());
        assert_eq!(s.unwrap().events[0].parameters[0].name(), Some("p1"));
    }

    #[test]
    fn test_duplicate_event_id() {
        let (s, errs) = service(&SERVICE.replace("{name: b, id: 2}", "{name: b, id: 1}"));
        assert!(s.is_none());
        assert_eq!(errs.diagnostics()[0].location.field.to_string(), "events.1.id");
    }
}
