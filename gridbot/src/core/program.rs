//! Owned program representation consumed by the engine.
//!
//! A program is plain data: nodes own their child sequences by value and hold
//! no reference to any editor or UI element. The engine never mutates a
//! program while it runs.

use std::collections::HashMap;
use std::fmt;

use serde_json::{Value, json};

use crate::core::types::Register;

/// Comparison used by [`Condition::RegisterCompare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equals,
    Greater,
}

/// Boolean expression evaluated against the world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    WallAhead,
    GoalAhead,
    PathClear,
    True,
    False,
    RandomBoolean,
    /// Negation. The inner slot may be empty.
    Not(Option<Box<Condition>>),
    RegisterCompare {
        register: Register,
        op: CompareOp,
        value: i64,
    },
    /// Unrecognized condition kept for display and re-export. Evaluates to false.
    Unknown {
        kind: String,
        /// The condition as read: a bare tag or a `{type, ...}` object.
        source: Value,
    },
}

impl Condition {
    pub fn not(inner: Condition) -> Self {
        Condition::Not(Some(Box::new(inner)))
    }

    /// Placeholder for an unrecognized bare tag.
    pub fn unknown(tag: &str) -> Self {
        Condition::Unknown {
            kind: tag.to_string(),
            source: Value::String(tag.to_string()),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::WallAhead => f.write_str("wallAhead"),
            Condition::GoalAhead => f.write_str("goalAhead"),
            Condition::PathClear => f.write_str("pathClear"),
            Condition::True => f.write_str("true"),
            Condition::False => f.write_str("false"),
            Condition::RandomBoolean => f.write_str("randomBoolean"),
            Condition::Not(Some(inner)) => write!(f, "not({inner})"),
            Condition::Not(None) => f.write_str("not(<empty>)"),
            Condition::RegisterCompare {
                register,
                op: CompareOp::Equals,
                value,
            } => write!(f, "{register} == {value}"),
            Condition::RegisterCompare {
                register,
                op: CompareOp::Greater,
                value,
            } => write!(f, "{register} > {value}"),
            Condition::Unknown { kind, .. } => write!(f, "{kind}?"),
        }
    }
}

/// A single program node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Move,
    TurnLeft,
    TurnRight,
    SetRegister {
        register: Register,
        value: i64,
    },
    Increment {
        register: Register,
    },
    Decrement {
        register: Register,
    },
    Repeat {
        count: i64,
        body: Vec<Instruction>,
    },
    If {
        condition: Option<Condition>,
        body: Vec<Instruction>,
    },
    IfElse {
        condition: Option<Condition>,
        if_body: Vec<Instruction>,
        else_body: Vec<Instruction>,
    },
    While {
        condition: Option<Condition>,
        body: Vec<Instruction>,
    },
    Call {
        function_name: String,
    },
    /// Subroutine definition. Only valid as a top-level entry of [`Program::functions`].
    FunctionDef {
        function_name: String,
        body: Vec<Instruction>,
    },
    /// Inert placeholder for an unrecognized type code.
    Unknown {
        kind: String,
        /// The node as read, re-emitted on export.
        source: Value,
    },
}

impl Instruction {
    /// Placeholder for an unrecognized type code with no other fields.
    pub fn unknown(kind: &str) -> Self {
        Instruction::Unknown {
            kind: kind.to_string(),
            source: json!({ "type": kind }),
        }
    }

    /// Stable type code, shared with the program file format.
    pub fn kind(&self) -> &str {
        match self {
            Instruction::Move => "move",
            Instruction::TurnLeft => "turnLeft",
            Instruction::TurnRight => "turnRight",
            Instruction::SetRegister { .. } => "set",
            Instruction::Increment { .. } => "increment",
            Instruction::Decrement { .. } => "decrement",
            Instruction::Repeat { .. } => "repeat",
            Instruction::If { .. } => "if",
            Instruction::IfElse { .. } => "ifElse",
            Instruction::While { .. } => "while",
            Instruction::Call { .. } => "call",
            Instruction::FunctionDef { .. } => "function",
            Instruction::Unknown { kind, .. } => kind.as_str(),
        }
    }

    /// Child sequences in declaration order (`body`, or `ifBody` then `elseBody`).
    pub fn bodies(&self) -> Vec<&[Instruction]> {
        match self {
            Instruction::Repeat { body, .. }
            | Instruction::If { body, .. }
            | Instruction::While { body, .. }
            | Instruction::FunctionDef { body, .. } => vec![body.as_slice()],
            Instruction::IfElse {
                if_body, else_body, ..
            } => vec![if_body.as_slice(), else_body.as_slice()],
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::SetRegister { register, value } => write!(f, "set {register} = {value}"),
            Instruction::Increment { register } => write!(f, "increment {register}"),
            Instruction::Decrement { register } => write!(f, "decrement {register}"),
            Instruction::Repeat { count, .. } => write!(f, "repeat {count}"),
            Instruction::If { condition, .. }
            | Instruction::IfElse { condition, .. }
            | Instruction::While { condition, .. } => match condition {
                Some(condition) => write!(f, "{} {condition}", self.kind()),
                None => write!(f, "{} <empty>", self.kind()),
            },
            Instruction::Call { function_name } => write!(f, "call {function_name}"),
            Instruction::FunctionDef { function_name, .. } => {
                write!(f, "function {function_name}")
            }
            _ => f.write_str(self.kind()),
        }
    }
}

/// A complete program: subroutine definitions plus the main sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    /// Top-level `FunctionDef` entries, in editor order.
    pub functions: Vec<Instruction>,
    pub main: Vec<Instruction>,
}

impl Program {
    pub fn new(main: Vec<Instruction>) -> Self {
        Self {
            functions: Vec::new(),
            main,
        }
    }

    pub fn with_function(mut self, name: &str, body: Vec<Instruction>) -> Self {
        self.functions.push(Instruction::FunctionDef {
            function_name: name.to_string(),
            body,
        });
        self
    }

    /// True when there is nothing to execute and nothing to define.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.main.is_empty()
    }
}

/// Subroutine bodies indexed by name, fixed for the duration of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionTable {
    bodies: HashMap<String, Vec<Instruction>>,
}

impl FunctionTable {
    /// Build the table from top-level definitions.
    ///
    /// Entries that are not `FunctionDef` are ignored. A later definition with
    /// the same name replaces an earlier one.
    pub fn from_definitions(definitions: &[Instruction]) -> Self {
        let bodies = definitions
            .iter()
            .filter_map(|definition| match definition {
                Instruction::FunctionDef {
                    function_name,
                    body,
                } => Some((function_name.clone(), body.clone())),
                _ => None,
            })
            .collect();
        Self { bodies }
    }

    pub fn get(&self, name: &str) -> Option<&[Instruction]> {
        self.bodies.get(name).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Defined names in lexicographic order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.bodies.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
