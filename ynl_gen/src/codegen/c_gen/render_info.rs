use crate::error::{GenError, GenResult};
use crate::spec::naming::c_lower;
use crate::spec::{Family, OpModeKind, Operation, Struct};

/// Which peer the code is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Space {
    User,
    Kernel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Request,
    Reply,
    /* Nested structs, not tied to an op */
    Base,
}

impl Direction {
    pub fn suffix(&self) -> &'static str {
        match self {
            Direction::Request => "_req",
            Direction::Reply => "_rsp",
            Direction::Base => "",
        }
    }

    /// The opposite direction.
    pub fn rdir(&self) -> Direction {
        match self {
            Direction::Request => Direction::Reply,
            Direction::Reply => Direction::Request,
            Direction::Base => Direction::Base,
        }
    }

    /* Argument name used by free helpers */
    pub fn free_arg_name(&self) -> &'static str {
        match self {
            Direction::Request => "req",
            Direction::Reply => "rsp",
            Direction::Base => "obj",
        }
    }
}

/// Everything needed to render one (op, mode) pair or one nested set.
pub struct RenderInfo<'f> {
    pub family: &'f Family,
    pub space: Space,
    pub op: Option<&'f Operation>,
    pub op_mode: Option<OpModeKind>,
    pub attr_set: String,
    /* do and dump replies parse the same way */
    pub type_consistent: bool,
    pub type_name: String,
    pub type_name_conflict: bool,
    pub request: Option<Struct>,
    pub reply: Option<Struct>,
}

impl<'f> RenderInfo<'f> {
    pub fn for_op(family: &'f Family, space: Space, op: &'f Operation, op_mode: OpModeKind) -> GenResult<Self> {
        /* A dump without a matching do needs its own reply type */
        let mut type_consistent = true;
        if op_mode != OpModeKind::Do {
            if let Some(dump) = &op.dump {
                type_consistent = op.do_.as_ref().is_some_and(|do_| do_.reply == dump.reply);
            }
        }

        let attr_set = op
            .attr_set
            .clone()
            .ok_or_else(|| GenError::OpWithoutAttrSet(op.name.clone()))?;

        let request = match op.request_attrs(op_mode) {
            Some(attrs) => Some(Struct::new(family, &attr_set, Some(attrs))?),
            None => None,
        };
        /* Events carry a mocked-up `do` reply */
        let reply = match op.reply_attrs(op_mode) {
            Some(attrs) => Some(Struct::new(family, &attr_set, Some(attrs))?),
            None => None,
        };

        Ok(Self {
            family,
            space,
            op: Some(op),
            op_mode: Some(op_mode),
            attr_set,
            type_consistent,
            type_name: c_lower(&op.name),
            type_name_conflict: false,
            request,
            reply,
        })
    }

    pub fn for_set(family: &'f Family, space: Space, attr_set: &str) -> Self {
        Self {
            family,
            space,
            op: None,
            op_mode: None,
            attr_set: attr_set.to_string(),
            type_consistent: true,
            type_name: c_lower(attr_set),
            type_name_conflict: family.consts.contains_key(attr_set),
            request: None,
            reply: None,
        }
    }

    pub fn operation(&self) -> GenResult<&'f Operation> {
        self.op.ok_or_else(|| GenError::UnknownOperation(self.type_name.clone()))
    }

    pub fn op_mode_is(&self, kind: OpModeKind) -> bool {
        self.op_mode == Some(kind)
    }

    pub fn has_request(&self) -> bool {
        self.request.is_some()
    }

    pub fn has_reply(&self) -> bool {
        self.reply.is_some()
    }

    /// Name stem of the C types and helpers for a direction.
    pub fn op_prefix(&self, direction: Direction, deref: bool) -> String {
        let mut suffix = format!("_{}", self.type_name);

        match self.op_mode {
            None | Some(OpModeKind::Do) => suffix.push_str(direction.suffix()),
            Some(mode) => {
                if direction == Direction::Request {
                    suffix.push_str("_req_dump");
                } else if self.type_consistent {
                    if deref {
                        suffix.push_str(direction.suffix());
                    } else {
                        suffix.push_str(match mode {
                            OpModeKind::Dump => "_list",
                            OpModeKind::Notify => "_ntf",
                            OpModeKind::Do | OpModeKind::Event => "",
                        });
                    }
                } else {
                    suffix.push_str("_rsp");
                    suffix.push_str(if deref { "_dump" } else { "_list" });
                }
            }
        }

        format!("{}{}", self.family.name, suffix)
    }

    pub fn type_name(&self, direction: Direction, deref: bool) -> String {
        format!("struct {}", self.op_prefix(direction, deref))
    }

    pub fn struct_for(&self, direction: Direction) -> Option<&Struct> {
        match direction {
            Direction::Request => self.request.as_ref(),
            Direction::Reply => self.reply.as_ref(),
            Direction::Base => None,
        }
    }
}
