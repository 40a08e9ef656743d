use super::attr_set::AttrSet;
use super::enum_set::EnumSet;
use super::loader::SpecFile;
use super::naming::{c_lower, c_upper};
use super::operation::{OpModeKind, Operation};
use super::structs::Struct;
use crate::error::{GenError, GenResult};
use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet, VecDeque};
use tracing::{debug, trace};
use ynl_types::{Definition, DefinitionKind, EnumModel, FamilySpec, KernelPolicy, McastGroupSpec};

const SUPPORTED_PROTOCOLS: &[&str] = &["genetlink", "genetlink-c", "genetlink-legacy"];

/// A top-level definition: an enum/flags set or a plain constant.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Const {
    Enum(EnumSet),
    Value(Definition),
}

/// Attribute names an operation root set is used with, per direction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RootSet {
    pub request: BTreeSet<String>,
    pub reply: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HookList {
    pub do_: Vec<String>,
    pub dump: Vec<String>,
}

/// Pre/post callbacks named by operations, each listed once in
/// declaration order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Hooks {
    pub pre: HookList,
    pub post: HookList,
}

#[derive(Debug, Clone, Serialize)]
pub struct GlobalPolicy {
    pub set: String,
    pub attrs: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Family {
    pub name: String,
    pub c_name: String,
    pub license: String,
    pub doc: Option<String>,
    pub protocol: String,
    pub version: u32,
    pub fam_key: String,
    pub ver_key: String,
    pub uapi_header: String,
    pub kernel_policy: KernelPolicy,
    pub msg_id_model: EnumModel,
    pub op_prefix: String,
    pub async_op_prefix: String,
    /* Notifications get their own enum */
    pub separate_ntf: bool,
    pub max_by_define: bool,
    pub cmd_max_name: Option<String>,
    pub cmd_cnt_name: Option<String>,
    pub attr_cnt_name: Option<String>,
    #[serde(skip)]
    pub ops_enum_name: Option<Option<String>>,
    #[serde(skip)]
    pub async_enum_name: Option<Option<String>>,

    pub definitions: Vec<Definition>,
    pub consts: IndexMap<String, Const>,
    pub attr_sets: IndexMap<String, AttrSet>,
    /* Every message, including excluded ones */
    pub msgs: IndexMap<String, Operation>,
    op_names: Vec<String>,
    ntf_names: Vec<String>,
    pub mcgrps: Vec<McastGroupSpec>,

    /* Resolve phase */
    pub hooks: Hooks,
    pub root_sets: IndexMap<String, RootSet>,
    pub pure_nested_structs: IndexMap<String, Struct>,
    pub global_policy: Option<GlobalPolicy>,
}

impl Family {
    /// Build and resolve a family. Operations whose name matches one of
    /// `exclude_ops` from the start are left out of generation.
    pub fn new(spec: &SpecFile, exclude_ops: &[Regex]) -> GenResult<Self> {
        let mut family = Self::construct(&spec.family, &spec.license, exclude_ops)?;
        family.resolve()?;
        Ok(family)
    }

    /* Phase one: entities with name-based references */
    fn construct(spec: &FamilySpec, license: &str, exclude_ops: &[Regex]) -> GenResult<Self> {
        let name = spec.name.clone();

        let mut consts = IndexMap::new();
        for def in &spec.definitions {
            let value = match def.kind {
                DefinitionKind::Const => Const::Value(def.clone()),
                DefinitionKind::Enum | DefinitionKind::Flags => Const::Enum(EnumSet::new(&name, def)),
            };
            consts.insert(def.name.clone(), value);
        }

        let mut attr_sets = IndexMap::new();
        for set_spec in &spec.attribute_sets {
            let set = AttrSet::new(&name, &consts, &attr_sets, set_spec)?;
            attr_sets.insert(set.name.clone(), set);
        }

        let msgs = number_operations(&name, spec)?;

        let mut op_names = Vec::new();
        let mut ntf_names = Vec::new();
        for (op_name, op) in &msgs {
            if is_excluded(exclude_ops, op_name) {
                debug!(op = %op_name, "excluding operation");
                continue;
            }
            if op.is_resv {
                continue;
            }
            if !op.is_async && op.attr_set.is_some() {
                op_names.push(op_name.clone());
            } else if op.is_async {
                ntf_names.push(op_name.clone());
            }
        }

        let op_prefix = c_upper(
            spec.operations
                .name_prefix
                .as_deref()
                .unwrap_or(&format!("{}-cmd-", name)),
        );
        let async_op_prefix = match &spec.operations.async_prefix {
            Some(prefix) => c_upper(prefix),
            None => op_prefix.clone(),
        };
        let fam_key = c_upper(
            spec.c_family_name
                .as_deref()
                .unwrap_or(&format!("{}_FAMILY_NAME", name)),
        );
        let ver_key = c_upper(
            spec.c_version_name
                .as_deref()
                .unwrap_or(&format!("{}_FAMILY_VERSION", name)),
        );
        let uapi_header = spec
            .uapi_header
            .clone()
            .unwrap_or_else(|| format!("linux/{}.h", name));

        Ok(Self {
            c_name: c_lower(&name),
            name,
            license: license.to_string(),
            doc: spec.doc.clone(),
            protocol: spec.protocol.clone().unwrap_or_else(|| "genetlink".to_string()),
            version: spec.version.unwrap_or(1),
            fam_key,
            ver_key,
            uapi_header,
            kernel_policy: spec.kernel_policy,
            msg_id_model: spec.operations.enum_model,
            op_prefix,
            async_op_prefix,
            separate_ntf: spec.operations.async_prefix.is_some(),
            max_by_define: spec.max_by_define,
            cmd_max_name: spec.cmd_max_name.clone(),
            cmd_cnt_name: spec.cmd_cnt_name.clone(),
            attr_cnt_name: spec.attr_cnt_name.clone(),
            ops_enum_name: spec.operations.enum_name.clone(),
            async_enum_name: spec.operations.async_enum.clone(),
            definitions: spec.definitions.clone(),
            consts,
            attr_sets,
            msgs,
            op_names,
            ntf_names,
            mcgrps: spec.mcast_groups.list.clone(),
            hooks: Hooks::default(),
            root_sets: IndexMap::new(),
            pure_nested_structs: IndexMap::new(),
            global_policy: None,
        })
    }

    /* Phase two: every reference is known, derive the rest */
    fn resolve(&mut self) -> GenResult<()> {
        if !SUPPORTED_PROTOCOLS.contains(&self.protocol.as_str()) {
            return Err(GenError::UnsupportedProtocol(self.protocol.clone()));
        }

        for set in self.attr_sets.values_mut() {
            for attr in set.attrs.values_mut() {
                attr.resolve(&self.consts)?;
            }
        }

        self.resolve_operations()?;
        self.mark_notify()?;
        for op in self.msgs.values_mut() {
            op.mock_up_event();
        }

        self.load_root_sets()?;
        self.load_nested_sets()?;
        self.load_hooks();

        if self.kernel_policy == KernelPolicy::Global {
            self.load_global_policy()?;
        }
        Ok(())
    }

    fn resolve_operations(&mut self) -> GenResult<()> {
        let mut notify_sets = Vec::new();
        for op in self.msgs.values() {
            if let Some(set) = &op.attr_set {
                self.attr_set(set)?;
            } else if let Some(target) = &op.notify {
                let target_op = self.op(target)?;
                let set = target_op
                    .attr_set
                    .clone()
                    .ok_or_else(|| GenError::OpWithoutAttrSet(target.clone()))?;
                notify_sets.push((op.name.clone(), set));
            } else if !op.is_resv {
                return Err(GenError::OpWithoutAttrSet(op.name.clone()));
            }
        }

        for (name, set) in notify_sets {
            if let Some(op) = self.msgs.get_mut(&name) {
                op.attr_set = Some(set);
            }
        }
        for op in self.msgs.values_mut() {
            op.resolve(&self.op_prefix, &self.async_op_prefix);
        }
        Ok(())
    }

    fn mark_notify(&mut self) -> GenResult<()> {
        let targets: Vec<String> = self.msgs.values().filter_map(|op| op.notify.clone()).collect();
        for target in targets {
            let op = self
                .msgs
                .get_mut(&target)
                .ok_or_else(|| GenError::UnknownOperation(target.clone()))?;
            op.has_ntf = true;
        }
        Ok(())
    }

    fn load_root_sets(&mut self) -> GenResult<()> {
        for op in self.msgs.values() {
            /* Notifications reuse the root set of the op they notify about */
            if op.notify.is_some() {
                continue;
            }
            let Some(set_name) = &op.attr_set else {
                continue;
            };
            let attr_set = self.attr_set(set_name)?;

            let mut usage = RootSet::default();
            for mode in [OpModeKind::Do, OpModeKind::Dump] {
                usage.request.extend(op.request_attrs(mode).into_iter().flatten().cloned());
                usage.reply.extend(op.reply_attrs(mode).into_iter().flatten().cloned());
            }
            usage.reply.extend(op.event.iter().flatten().cloned());

            for name in usage.request.iter().chain(usage.reply.iter()) {
                attr_set.get(name)?;
            }

            let entry = self.root_sets.entry(set_name.clone()).or_default();
            entry.request.extend(usage.request);
            entry.reply.extend(usage.reply);
        }
        Ok(())
    }

    fn load_nested_sets(&mut self) -> GenResult<()> {
        let mut queue: VecDeque<String> = self.root_sets.keys().cloned().collect();
        let mut seen: HashSet<String> = queue.iter().cloned().collect();

        while let Some(set_name) = queue.pop_front() {
            let refs: Vec<(String, Vec<String>)> = self
                .attr_set(&set_name)?
                .attrs
                .values()
                .filter_map(|attr| {
                    let nested = attr.nested_set()?.to_string();
                    let inherit = if !attr.type_value.is_empty() {
                        attr.type_value.clone()
                    } else if attr.kind == super::attr::AttrKind::ArrayNest {
                        vec!["idx".to_string()]
                    } else {
                        Vec::new()
                    };
                    Some((nested, inherit))
                })
                .collect();

            for (nested, inherit) in refs {
                if seen.insert(nested.clone()) {
                    queue.push_back(nested.clone());
                }
                if self.root_sets.contains_key(&nested) {
                    return Err(GenError::RootAndNested(nested));
                }
                if !self.pure_nested_structs.contains_key(&nested) {
                    let nested_struct = Struct::new(self, &nested, None)?;
                    trace!(set = %nested, "new nested struct");
                    self.pure_nested_structs.insert(nested.clone(), nested_struct);
                }
                if let Some(nested_struct) = self.pure_nested_structs.get_mut(&nested) {
                    nested_struct.set_inherited(inherit)?;
                }
            }
        }

        let mut marks = Vec::new();
        for (root, usage) in &self.root_sets {
            for attr in self.attr_set(root)?.attrs.values() {
                if let Some(nested) = attr.nested_set() {
                    marks.push((
                        nested.to_string(),
                        usage.request.contains(&attr.name),
                        usage.reply.contains(&attr.name),
                    ));
                }
            }
        }
        for (nested, request, reply) in marks {
            if let Some(nested_struct) = self.pure_nested_structs.get_mut(&nested) {
                nested_struct.request |= request;
                nested_struct.reply |= reply;
            }
        }

        self.order_nested_structs()?;
        self.propagate_usage();
        Ok(())
    }

    /* Move each struct behind the structs it depends on. Bounded to n^2
       rounds; anything still pending afterwards sits on a cycle. */
    fn order_nested_structs(&mut self) -> GenResult<()> {
        let mut pending: VecDeque<String> = self.pure_nested_structs.keys().cloned().collect();
        let mut settled: HashSet<String> = HashSet::new();
        let rounds = pending.len() * pending.len();

        for _ in 0..rounds {
            let Some(name) = pending.pop_front() else {
                break;
            };
            let blocked = self
                .attr_set(&name)?
                .attrs
                .values()
                .filter_map(|attr| attr.nested_set())
                .any(|dep| !settled.contains(dep));
            if blocked {
                if let Some(nested_struct) = self.pure_nested_structs.shift_remove(&name) {
                    self.pure_nested_structs.insert(name.clone(), nested_struct);
                }
                pending.push_back(name);
            } else {
                settled.insert(name);
            }
        }

        if !pending.is_empty() {
            let mut cycle: Vec<String> = pending.into_iter().collect();
            cycle.sort();
            return Err(GenError::NestedCycle(cycle));
        }
        Ok(())
    }

    /* Dependents come last, so walking backwards reaches parents first */
    fn propagate_usage(&mut self) {
        let names: Vec<String> = self.pure_nested_structs.keys().rev().cloned().collect();
        for name in names {
            let Some(parent) = self.pure_nested_structs.get(&name) else {
                continue;
            };
            let (request, reply) = (parent.request, parent.reply);
            let children: Vec<String> = self
                .attr_sets
                .get(&name)
                .map(|set| {
                    set.attrs
                        .values()
                        .filter_map(|attr| attr.nested_set().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();
            for child in children {
                if let Some(child_struct) = self.pure_nested_structs.get_mut(&child) {
                    child_struct.request |= request;
                    child_struct.reply |= reply;
                }
            }
        }
    }

    fn load_hooks(&mut self) {
        let mut hooks = Hooks::default();
        for op in self.ops() {
            for (kind, mode) in [(OpModeKind::Do, &op.do_), (OpModeKind::Dump, &op.dump)] {
                let Some(mode) = mode else {
                    continue;
                };
                for (name, list) in [(&mode.pre, &mut hooks.pre), (&mode.post, &mut hooks.post)] {
                    let Some(name) = name else {
                        continue;
                    };
                    let names = if kind == OpModeKind::Do { &mut list.do_ } else { &mut list.dump };
                    if !names.contains(name) {
                        names.push(name.clone());
                    }
                }
            }
        }
        self.hooks = hooks;
    }

    fn load_global_policy(&mut self) -> GenResult<()> {
        let mut set_name: Option<&str> = None;
        let mut requested: HashSet<&str> = HashSet::new();
        for op in self.ops() {
            let Some(op_set) = op.attr_set.as_deref() else {
                continue;
            };
            match set_name {
                None => set_name = Some(op_set),
                Some(existing) if existing != op_set => return Err(GenError::GlobalPolicySet),
                Some(_) => {}
            }
            for mode in [OpModeKind::Do, OpModeKind::Dump] {
                requested.extend(op.request_attrs(mode).into_iter().flatten().map(String::as_str));
            }
        }

        let Some(set_name) = set_name else {
            return Ok(());
        };
        let attrs = self
            .attr_set(set_name)?
            .attrs
            .keys()
            .filter(|name| requested.contains(name.as_str()))
            .cloned()
            .collect();
        self.global_policy = Some(GlobalPolicy {
            set: set_name.to_string(),
            attrs,
        });
        Ok(())
    }

    pub fn attr_set(&self, name: &str) -> GenResult<&AttrSet> {
        self.attr_sets
            .get(name)
            .ok_or_else(|| GenError::UnknownAttrSet(name.to_string()))
    }

    pub fn op(&self, name: &str) -> GenResult<&Operation> {
        self.msgs
            .get(name)
            .ok_or_else(|| GenError::UnknownOperation(name.to_string()))
    }

    /// Request/response operations selected for generation.
    pub fn ops(&self) -> impl Iterator<Item = &Operation> {
        self.op_names.iter().filter_map(|name| self.msgs.get(name))
    }

    /// Notifications and events selected for generation.
    pub fn ntfs(&self) -> impl Iterator<Item = &Operation> {
        self.ntf_names.iter().filter_map(|name| self.msgs.get(name))
    }

    pub fn enum_sets(&self) -> impl Iterator<Item = &EnumSet> {
        self.consts.values().filter_map(|c| match c {
            Const::Enum(set) => Some(set),
            Const::Value(_) => None,
        })
    }

    pub fn enum_set(&self, name: &str) -> Option<&EnumSet> {
        match self.consts.get(name) {
            Some(Const::Enum(set)) => Some(set),
            _ => None,
        }
    }
}

/* Patterns match from the start of the name */
fn is_excluded(exclude_ops: &[Regex], name: &str) -> bool {
    exclude_ops
        .iter()
        .any(|re| re.find(name).is_some_and(|m| m.start() == 0))
}

fn number_operations(family_name: &str, spec: &FamilySpec) -> GenResult<IndexMap<String, Operation>> {
    let mut msgs = IndexMap::new();
    match spec.operations.enum_model {
        EnumModel::Unified => {
            let mut val = 1;
            for elem in &spec.operations.list {
                if let Some(value) = elem.value {
                    val = value;
                }
                let op = Operation::new(family_name, elem, Some(val), Some(val));
                msgs.insert(op.name.clone(), op);
                val += 1;
            }
        }
        EnumModel::Directional => {
            let mut req_val = 1;
            let mut rsp_val = 1;
            for elem in &spec.operations.list {
                let op = if elem.notify.is_some() || elem.event.is_some() {
                    if let Some(value) = elem.value {
                        rsp_val = value;
                    }
                    let op = Operation::new(family_name, elem, None, Some(rsp_val));
                    rsp_val += 1;
                    op
                } else if let Some(mode) = elem.do_.as_ref().or(elem.dump.as_ref()) {
                    if let Some(value) = mode.request.as_ref().and_then(|r| r.value) {
                        req_val = value;
                    }
                    if let Some(value) = mode.reply.as_ref().and_then(|r| r.value) {
                        rsp_val = value;
                    }
                    let op = Operation::new(family_name, elem, Some(req_val), Some(rsp_val));
                    req_val += 1;
                    if mode.reply.is_some() {
                        rsp_val += 1;
                    }
                    op
                } else {
                    return Err(GenError::Directional(elem.name.clone()));
                };
                msgs.insert(op.name.clone(), op);
            }
        }
    }
    Ok(msgs)
}
