//! Versioned JSON program files (`version: "1.0"`).
//!
//! Decoding goes through private wire structs that mirror the file layout
//! exactly, then maps them onto [`Program`]. Unknown instruction types and
//! condition tags survive as placeholders holding every field this format
//! defines (`count`, bodies, nested conditions, ...), so a load/save cycle
//! re-emits them unchanged. Keys the format does not know are dropped.
//!
//! Nesting depth is unbounded in both directions: the JSON parser runs
//! without its recursion limit and every nested body or condition slot
//! grows the stack on demand.

use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::de::value::MapAccessDeserializer;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::core::program::{CompareOp, Condition, Instruction, Program};
use crate::core::types::{Register, UnknownRegisterError};
use crate::stack::ensure_sufficient_stack;

pub const FORMAT_VERSION: &str = "1.0";

const DEFAULT_REPEAT_COUNT: i64 = 3;
const DEFAULT_FUNCTION_NAME: &str = "func1";
const DEFAULT_REGISTER: &str = "R1";

#[derive(Debug, Error)]
pub enum ProgramFileError {
    #[error("malformed program file: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unsupported file version {}", .found.as_deref().unwrap_or("<missing>"))]
    UnsupportedVersion { found: Option<String> },
    #[error("unknown register '{0}'")]
    UnknownRegister(String),
}

/// A program together with the export metadata stored next to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramFile {
    /// Level id the program was exported from.
    pub level: Option<u32>,
    pub level_name: Option<String>,
    pub program: Program,
    /// Export timestamp, kept verbatim.
    pub export_date: Option<String>,
}

impl ProgramFile {
    /// Stamp `program` for export from `level` at the current UTC time.
    pub fn export(program: Program, level: u32, level_name: &str) -> Self {
        Self {
            level: Some(level),
            level_name: Some(level_name.to_string()),
            program,
            export_date: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }
}

/// Result of a successful decode plus the fallbacks applied along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub file: ProgramFile,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFile {
    version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    level_name: Option<String>,
    #[serde(default)]
    functions: Vec<WireInstruction>,
    #[serde(default)]
    main_program: Vec<WireInstruction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    export_date: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireInstruction {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    register: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    condition: Option<WireSlot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    body: Option<WireBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    if_body: Option<WireBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    else_body: Option<WireBody>,
}

/// A nested instruction sequence (`body`, `ifBody` or `elseBody`).
#[derive(Debug, Default)]
struct WireBody(Vec<WireInstruction>);

impl Serialize for WireBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ensure_sufficient_stack(|| self.0.serialize(serializer))
    }
}

impl<'de> Deserialize<'de> for WireBody {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        ensure_sufficient_stack(|| Vec::deserialize(deserializer).map(WireBody))
    }
}

/// A condition slot that is present in the file; an empty slot is `null`.
#[derive(Debug)]
struct WireSlot(Option<Box<WireCondition>>);

impl Serialize for WireSlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ensure_sufficient_stack(|| self.0.serialize(serializer))
    }
}

impl<'de> Deserialize<'de> for WireSlot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        ensure_sufficient_stack(|| Option::deserialize(deserializer).map(WireSlot))
    }
}

/// A bare tag (`"wallAhead"`) or a `{type, ...}` object.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WireCondition {
    Tag(String),
    Compound(WireCompound),
}

impl<'de> Deserialize<'de> for WireCondition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(WireConditionVisitor)
    }
}

/// Picks the variant from the JSON shape without buffering the subtree.
struct WireConditionVisitor;

impl<'de> Visitor<'de> for WireConditionVisitor {
    type Value = WireCondition;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a condition tag or a condition object")
    }

    fn visit_str<E: serde::de::Error>(self, tag: &str) -> Result<Self::Value, E> {
        Ok(WireCondition::Tag(tag.to_string()))
    }

    fn visit_string<E: serde::de::Error>(self, tag: String) -> Result<Self::Value, E> {
        Ok(WireCondition::Tag(tag))
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Self::Value, A::Error> {
        WireCompound::deserialize(MapAccessDeserializer::new(map)).map(WireCondition::Compound)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireCompound {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    register: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    condition: Option<WireSlot>,
}

/// Parse a program file. The caller's current program is never touched; a
/// failed decode simply returns the error.
pub fn decode(text: &str) -> Result<Decoded, ProgramFileError> {
    let mut reader = serde_json::Deserializer::from_str(text);
    reader.disable_recursion_limit();
    let raw = Value::deserialize(serde_stacker::Deserializer::new(&mut reader))?;
    reader.end()?;
    let version = raw.get("version").and_then(Value::as_str);
    if version != Some(FORMAT_VERSION) {
        return Err(ProgramFileError::UnsupportedVersion {
            found: raw.get("version").map(|found| match found {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
        });
    }
    let wire: WireFile = serde_json::from_value(raw)?;

    let mut decoder = Decoder::default();
    let functions = decoder.sequence(wire.functions)?;
    let main = decoder.sequence(wire.main_program)?;
    Ok(Decoded {
        file: ProgramFile {
            level: wire.level,
            level_name: wire.level_name,
            program: Program { functions, main },
            export_date: wire.export_date,
        },
        warnings: decoder.warnings,
    })
}

/// Serialize to pretty JSON.
pub fn encode(file: &ProgramFile) -> Result<String, ProgramFileError> {
    let wire = WireFile {
        version: FORMAT_VERSION.to_string(),
        level: file.level,
        level_name: file.level_name.clone(),
        functions: file.program.functions.iter().map(encode_instruction).collect(),
        main_program: file.program.main.iter().map(encode_instruction).collect(),
        export_date: file.export_date.clone(),
    };
    Ok(serde_json::to_string_pretty(&wire)?)
}

pub fn load_program_file(path: &Path) -> Result<Decoded> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    decode(&text).with_context(|| format!("decode {}", path.display()))
}

/// Write `file` as pretty JSON with a trailing newline.
pub fn write_program_file(path: &Path, file: &ProgramFile) -> Result<()> {
    let mut payload = encode(file).context("serialize program file")?;
    payload.push('\n');
    fs::write(path, payload).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

#[derive(Default)]
struct Decoder {
    warnings: Vec<String>,
}

impl Decoder {
    fn warn(&mut self, message: String) {
        warn!("{message}");
        self.warnings.push(message);
    }

    fn sequence(
        &mut self,
        wire: Vec<WireInstruction>,
    ) -> Result<Vec<Instruction>, ProgramFileError> {
        wire.into_iter()
            .map(|instruction| self.instruction(instruction))
            .collect()
    }

    fn body(&mut self, wire: Option<WireBody>) -> Result<Vec<Instruction>, ProgramFileError> {
        self.sequence(wire.unwrap_or_default().0)
    }

    fn instruction(&mut self, wire: WireInstruction) -> Result<Instruction, ProgramFileError> {
        ensure_sufficient_stack(|| self.map_instruction(wire))
    }

    fn map_instruction(&mut self, wire: WireInstruction) -> Result<Instruction, ProgramFileError> {
        let instruction = match wire.kind.as_str() {
            "move" => Instruction::Move,
            "turnLeft" => Instruction::TurnLeft,
            "turnRight" => Instruction::TurnRight,
            "set" => Instruction::SetRegister {
                register: register(wire.register.as_deref())?,
                value: wire.value.unwrap_or(0),
            },
            "increment" => Instruction::Increment {
                register: register(wire.register.as_deref())?,
            },
            "decrement" => Instruction::Decrement {
                register: register(wire.register.as_deref())?,
            },
            "repeat" => Instruction::Repeat {
                count: wire.count.unwrap_or(DEFAULT_REPEAT_COUNT),
                body: self.body(wire.body)?,
            },
            "if" => Instruction::If {
                condition: self.slot(wire.condition)?,
                body: self.body(wire.body)?,
            },
            "ifElse" => Instruction::IfElse {
                condition: self.slot(wire.condition)?,
                if_body: self.body(wire.if_body)?,
                else_body: self.body(wire.else_body)?,
            },
            "while" => Instruction::While {
                condition: self.slot(wire.condition)?,
                body: self.body(wire.body)?,
            },
            "call" => Instruction::Call {
                function_name: function_name(wire.function_name),
            },
            "function" => Instruction::FunctionDef {
                function_name: function_name(wire.function_name),
                body: self.body(wire.body)?,
            },
            _ => {
                self.warn(format!(
                    "Unknown instruction type '{}' kept as placeholder",
                    wire.kind
                ));
                let source = serde_json::to_value(&wire)?;
                Instruction::Unknown {
                    kind: wire.kind,
                    source,
                }
            }
        };
        Ok(instruction)
    }

    fn slot(&mut self, slot: Option<WireSlot>) -> Result<Option<Condition>, ProgramFileError> {
        match slot.and_then(|WireSlot(inner)| inner) {
            Some(condition) => self.condition(*condition).map(Some),
            None => Ok(None),
        }
    }

    fn condition(&mut self, wire: WireCondition) -> Result<Condition, ProgramFileError> {
        ensure_sufficient_stack(|| self.map_condition(wire))
    }

    fn map_condition(&mut self, wire: WireCondition) -> Result<Condition, ProgramFileError> {
        let condition = match wire {
            WireCondition::Tag(tag) => match tag.as_str() {
                "wallAhead" => Condition::WallAhead,
                "goalAhead" => Condition::GoalAhead,
                "pathClear" => Condition::PathClear,
                "true" => Condition::True,
                "false" => Condition::False,
                "randomBoolean" => Condition::RandomBoolean,
                _ => {
                    self.warn(format!("Unknown condition '{tag}' kept as placeholder"));
                    Condition::unknown(&tag)
                }
            },
            WireCondition::Compound(compound) => match compound.kind.as_str() {
                "not" => Condition::Not(self.slot(compound.condition)?.map(Box::new)),
                "registerEquals" | "registerGreater" => Condition::RegisterCompare {
                    register: register(compound.register.as_deref())?,
                    op: if compound.kind == "registerEquals" {
                        CompareOp::Equals
                    } else {
                        CompareOp::Greater
                    },
                    value: compound.value.unwrap_or(0),
                },
                _ => {
                    self.warn(format!(
                        "Unknown condition '{}' kept as placeholder",
                        compound.kind
                    ));
                    let source = serde_json::to_value(&compound)?;
                    Condition::Unknown {
                        kind: compound.kind,
                        source,
                    }
                }
            },
        };
        Ok(condition)
    }
}

fn register(name: Option<&str>) -> Result<Register, ProgramFileError> {
    name.unwrap_or(DEFAULT_REGISTER)
        .parse()
        .map_err(|UnknownRegisterError(name)| ProgramFileError::UnknownRegister(name))
}

fn function_name(name: Option<String>) -> String {
    name.unwrap_or_else(|| DEFAULT_FUNCTION_NAME.to_string())
}

fn encode_sequence(body: &[Instruction]) -> Option<WireBody> {
    Some(WireBody(body.iter().map(encode_instruction).collect()))
}

fn encode_slot(slot: Option<&Condition>) -> Option<WireSlot> {
    Some(WireSlot(slot.map(|condition| Box::new(encode_condition(condition)))))
}

fn encode_instruction(instruction: &Instruction) -> WireInstruction {
    ensure_sufficient_stack(|| wire_instruction(instruction))
}

fn wire_instruction(instruction: &Instruction) -> WireInstruction {
    if let Instruction::Unknown { kind, source } = instruction {
        return WireInstruction::deserialize(source).unwrap_or_else(|_| WireInstruction {
            kind: kind.clone(),
            ..WireInstruction::default()
        });
    }
    let mut wire = WireInstruction {
        kind: instruction.kind().to_string(),
        ..WireInstruction::default()
    };
    match instruction {
        Instruction::Move
        | Instruction::TurnLeft
        | Instruction::TurnRight
        | Instruction::Unknown { .. } => {}
        Instruction::SetRegister { register, value } => {
            wire.register = Some(register.name().to_string());
            wire.value = Some(*value);
        }
        Instruction::Increment { register } | Instruction::Decrement { register } => {
            wire.register = Some(register.name().to_string());
        }
        Instruction::Repeat { count, body } => {
            wire.count = Some(*count);
            wire.body = encode_sequence(body);
        }
        Instruction::If { condition, body } | Instruction::While { condition, body } => {
            wire.condition = encode_slot(condition.as_ref());
            wire.body = encode_sequence(body);
        }
        Instruction::IfElse {
            condition,
            if_body,
            else_body,
        } => {
            wire.condition = encode_slot(condition.as_ref());
            wire.if_body = encode_sequence(if_body);
            wire.else_body = encode_sequence(else_body);
        }
        Instruction::Call { function_name } => {
            wire.function_name = Some(function_name.clone());
        }
        Instruction::FunctionDef {
            function_name,
            body,
        } => {
            wire.function_name = Some(function_name.clone());
            wire.body = encode_sequence(body);
        }
    }
    wire
}

fn encode_condition(condition: &Condition) -> WireCondition {
    ensure_sufficient_stack(|| wire_condition(condition))
}

fn wire_condition(condition: &Condition) -> WireCondition {
    let tag = |tag: &str| WireCondition::Tag(tag.to_string());
    match condition {
        Condition::WallAhead => tag("wallAhead"),
        Condition::GoalAhead => tag("goalAhead"),
        Condition::PathClear => tag("pathClear"),
        Condition::True => tag("true"),
        Condition::False => tag("false"),
        Condition::RandomBoolean => tag("randomBoolean"),
        Condition::Unknown { kind, source } => {
            WireCondition::deserialize(source).unwrap_or_else(|_| tag(kind))
        }
        Condition::Not(inner) => WireCondition::Compound(WireCompound {
            kind: "not".to_string(),
            register: None,
            value: None,
            condition: encode_slot(inner.as_deref()),
        }),
        Condition::RegisterCompare {
            register,
            op,
            value,
        } => WireCondition::Compound(WireCompound {
            kind: match op {
                CompareOp::Equals => "registerEquals",
                CompareOp::Greater => "registerGreater",
            }
            .to_string(),
            register: Some(register.name().to_string()),
            value: Some(*value),
            condition: None,
        }),
    }
}
