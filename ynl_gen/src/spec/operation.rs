use super::naming::{c_lower, c_upper};
use serde::Serialize;
use ynl_types::OperationSpec;

pub use ynl_types::{OpDirectionSpec as OpDirection, OpModeSpec as OpMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpModeKind {
    Do,
    Dump,
    Notify,
    Event,
}

impl OpModeKind {
    pub fn name(&self) -> &'static str {
        match self {
            OpModeKind::Do => "do",
            OpModeKind::Dump => "dump",
            OpModeKind::Notify => "notify",
            OpModeKind::Event => "event",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Operation {
    pub name: String,
    pub doc: Option<String>,
    pub render_name: String,
    /* For notifications, the set of the op they notify about */
    pub attr_set: Option<String>,
    /* Explicit `value` key from the spec */
    pub spec_value: Option<u32>,
    /* Shared id, only when request and response ids match */
    pub value: Option<u32>,
    pub req_value: Option<u32>,
    pub rsp_value: Option<u32>,
    pub is_call: bool,
    pub is_async: bool,
    pub is_resv: bool,
    /* Request present in both do and dump */
    pub dual_policy: bool,
    pub has_ntf: bool,
    pub enum_name: String,
    pub do_: Option<OpMode>,
    pub dump: Option<OpMode>,
    pub event: Option<Vec<String>>,
    pub notify: Option<String>,
    pub flags: Vec<String>,
    pub dont_validate: Vec<String>,
    pub mcgrp: Option<String>,
}

impl Operation {
    pub fn new(family_name: &str, spec: &OperationSpec, req_value: Option<u32>, rsp_value: Option<u32>) -> Self {
        let is_call = spec.do_.is_some() || spec.dump.is_some();
        let is_async = spec.notify.is_some() || spec.event.is_some();
        let request_in = |mode: &Option<OpMode>| mode.as_ref().is_some_and(|m| m.request.is_some());

        Self {
            name: spec.name.clone(),
            doc: spec.doc.clone(),
            render_name: format!("{}_{}", family_name, c_lower(&spec.name)),
            attr_set: spec.attribute_set.clone(),
            spec_value: spec.value,
            value: if req_value == rsp_value { req_value } else { None },
            req_value,
            rsp_value,
            is_call,
            is_async,
            is_resv: !is_async && !is_call,
            dual_policy: request_in(&spec.do_) && request_in(&spec.dump),
            has_ntf: false,
            enum_name: String::new(),
            do_: spec.do_.clone(),
            dump: spec.dump.clone(),
            event: spec.event.as_ref().map(|e| e.attributes.clone()),
            notify: spec.notify.clone(),
            flags: spec.flags.clone(),
            dont_validate: spec.dont_validate.clone(),
            mcgrp: spec.mcgrp.clone(),
        }
    }

    pub fn resolve(&mut self, op_prefix: &str, async_op_prefix: &str) {
        let prefix = if self.is_async { async_op_prefix } else { op_prefix };
        self.enum_name = format!("{}{}", prefix, c_upper(&self.name));
    }

    /// Direction definitions for a mode. Notifications share the `do`
    /// shape of their op and events carry a synthetic `do` reply.
    pub fn mode(&self, kind: OpModeKind) -> Option<&OpMode> {
        match kind {
            OpModeKind::Do | OpModeKind::Notify | OpModeKind::Event => self.do_.as_ref(),
            OpModeKind::Dump => self.dump.as_ref(),
        }
    }

    pub fn has_request(&self, kind: OpModeKind) -> bool {
        self.mode(kind).is_some_and(|m| m.request.is_some())
    }

    pub fn has_reply(&self, kind: OpModeKind) -> bool {
        self.mode(kind).is_some_and(|m| m.reply.is_some())
    }

    pub fn request_attrs(&self, kind: OpModeKind) -> Option<&[String]> {
        self.mode(kind)
            .and_then(|m| m.request.as_ref())
            .map(|d| d.attributes.as_slice())
    }

    pub fn reply_attrs(&self, kind: OpModeKind) -> Option<&[String]> {
        self.mode(kind)
            .and_then(|m| m.reply.as_ref())
            .map(|d| d.attributes.as_slice())
    }

    /* Synthesize a `do` reply for events so reply parsing can be rendered */
    pub(crate) fn mock_up_event(&mut self) {
        if let Some(attributes) = &self.event {
            self.do_ = Some(OpMode {
                reply: Some(OpDirection {
                    value: None,
                    attributes: attributes.clone(),
                }),
                ..Default::default()
            });
        }
    }
}
