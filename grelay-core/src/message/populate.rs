//! # Message Population
//!
//! Writes the values of a [`ParameterBag`] into a `DynamicMessage`.
//!
//! Every bag key is a dot separated field path. All segments but the last walk into
//! singular sub-messages (allocating them on the way); the last one names the field to set.
//! How the raw strings are interpreted depends on the declared kind of that field:
//!
//! | Field | Behaviour |
//! |---|---|
//! | singular | the first value is parsed and set, the rest are ignored |
//! | repeated | every value is parsed and appended, in order |
//! | map | every value is a `key:value` pair, split on the first `:` |
//! | enum | a number is taken as the enum number, anything else must be a value name |
//! | bytes | standard base64 |
//!
//! Paths that do not name a field of the schema are dropped silently, so that clients keep
//! working while descriptors evolve.
use super::params::ParameterBag;
use base64::Engine;
use prost_reflect::{
    DynamicMessage, EnumDescriptor, FieldDescriptor, Kind, MapKey, MessageDescriptor,
    ReflectMessage, Value,
};

/// Longest accepted field path, in segments.
pub const MAX_FIELD_DEPTH: usize = 32;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParamError {
    #[error("Invalid value '{value}' for field '{field}': {reason}")]
    InvalidParameter {
        field: String,
        value: String,
        reason: String,
    },
    #[error("Field '{field}' of kind '{kind}' cannot be set from a parameter")]
    UnsupportedFieldKind { field: String, kind: String },
}

/// Writes every entry of `params` into `message`.
pub fn populate(message: &mut DynamicMessage, params: &ParameterBag) -> Result<(), ParamError> {
    for (key, values) in params.iter() {
        set_field_path(message, key, values)?;
    }
    Ok(())
}

fn set_field_path(
    message: &mut DynamicMessage,
    key: &str,
    values: &[String],
) -> Result<(), ParamError> {
    let path: Vec<&str> = key.split('.').collect();

    if path.len() > MAX_FIELD_DEPTH {
        return Err(ParamError::InvalidParameter {
            field: key.to_string(),
            value: values.first().cloned().unwrap_or_default(),
            reason: format!("field path is deeper than {MAX_FIELD_DEPTH} segments"),
        });
    }

    let Some((leaf, parents)) = path.split_last() else {
        return Ok(());
    };

    let mut current = message;
    for segment in parents {
        let Some(field) = find_field(&current.descriptor(), segment) else {
            return Ok(());
        };
        if field.is_list() || field.is_map() || field.kind().as_message().is_none() {
            return Ok(());
        }
        let Value::Message(child) = current.get_field_mut(&field) else {
            return Ok(());
        };
        current = child;
    }

    let Some(field) = find_field(&current.descriptor(), leaf) else {
        return Ok(());
    };

    if field.is_map() {
        set_map_field(current, &field, values)
    } else if field.is_list() {
        set_list_field(current, &field, values)
    } else {
        set_singular_field(current, &field, values)
    }
}

/// Matches a path segment against the field names, exactly first and then ignoring case.
fn find_field(descriptor: &MessageDescriptor, name: &str) -> Option<FieldDescriptor> {
    descriptor.get_field_by_name(name).or_else(|| {
        descriptor
            .fields()
            .find(|f| f.name().eq_ignore_ascii_case(name))
    })
}

fn set_singular_field(
    message: &mut DynamicMessage,
    field: &FieldDescriptor,
    values: &[String],
) -> Result<(), ParamError> {
    let Some(raw) = values.first() else {
        return Ok(());
    };

    let value = parse_field_value(field, &field.kind(), raw)?;
    message
        .try_set_field(field, value)
        .map_err(|e| invalid(field, raw, e.to_string()))
}

fn set_list_field(
    message: &mut DynamicMessage,
    field: &FieldDescriptor,
    values: &[String],
) -> Result<(), ParamError> {
    let kind = field.kind();
    let parsed = values
        .iter()
        .map(|raw| parse_field_value(field, &kind, raw))
        .collect::<Result<Vec<_>, _>>()?;

    if let Value::List(list) = message.get_field_mut(field) {
        list.extend(parsed);
    }
    Ok(())
}

fn set_map_field(
    message: &mut DynamicMessage,
    field: &FieldDescriptor,
    values: &[String],
) -> Result<(), ParamError> {
    let Kind::Message(entry) = field.kind() else {
        return Err(unsupported(field, &field.kind()));
    };
    let key_kind = entry.map_entry_key_field().kind();
    let value_kind = entry.map_entry_value_field().kind();

    let mut entries = Vec::with_capacity(values.len());
    for raw in values {
        let (raw_key, raw_value) = raw
            .split_once(':')
            .ok_or_else(|| invalid(field, raw, "map entries must be formatted as 'key:value'"))?;

        let key = parse_field_value(field, &key_kind, raw_key).and_then(|key| {
            into_map_key(key).ok_or_else(|| invalid(field, raw_key, "not a valid map key"))
        })?;

        if value_kind.as_message().is_some() {
            return Err(unsupported(field, &value_kind));
        }
        let value = parse_field_value(field, &value_kind, raw_value)?;

        entries.push((key, value));
    }

    if let Value::Map(map) = message.get_field_mut(field) {
        map.extend(entries);
    }
    Ok(())
}

/// Parses `raw` as a value of `kind`, the declared kind of `field` (or of one of its map
/// entry fields). `field` only serves error reporting.
fn parse_field_value(field: &FieldDescriptor, kind: &Kind, raw: &str) -> Result<Value, ParamError> {
    match kind {
        Kind::Enum(descriptor) => {
            parse_enum(descriptor, raw).ok_or_else(|| invalid(field, raw, "unknown enum value"))
        }
        Kind::Message(_) => Err(unsupported(field, kind)),
        scalar => match scalar_parser(scalar) {
            Some(parser) => parser(raw).map_err(|reason| invalid(field, raw, reason)),
            None => Err(unsupported(field, kind)),
        },
    }
}

fn parse_enum(descriptor: &EnumDescriptor, raw: &str) -> Option<Value> {
    if let Ok(number) = raw.parse::<i32>() {
        return Some(Value::EnumNumber(number));
    }
    descriptor
        .get_value_by_name(raw)
        .map(|value| Value::EnumNumber(value.number()))
}

type ScalarParser = fn(&str) -> Result<Value, String>;

/// The parser table for scalar kinds, keyed by declared kind.
fn scalar_parser(kind: &Kind) -> Option<ScalarParser> {
    let parser: ScalarParser = match kind {
        Kind::String => parse_string,
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => parse_i32,
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => parse_i64,
        Kind::Uint32 | Kind::Fixed32 => parse_u32,
        Kind::Uint64 | Kind::Fixed64 => parse_u64,
        Kind::Bool => parse_bool,
        Kind::Float => parse_f32,
        Kind::Double => parse_f64,
        Kind::Bytes => parse_bytes,
        Kind::Enum(_) | Kind::Message(_) => return None,
    };
    Some(parser)
}

fn parse_string(raw: &str) -> Result<Value, String> {
    Ok(Value::String(raw.to_string()))
}

fn parse_i32(raw: &str) -> Result<Value, String> {
    raw.parse::<i32>().map(Value::I32).map_err(|e| e.to_string())
}

fn parse_i64(raw: &str) -> Result<Value, String> {
    raw.parse::<i64>().map(Value::I64).map_err(|e| e.to_string())
}

fn parse_u32(raw: &str) -> Result<Value, String> {
    unsigned_digits(raw)?
        .parse::<u32>()
        .map(Value::U32)
        .map_err(|e| e.to_string())
}

fn parse_u64(raw: &str) -> Result<Value, String> {
    unsigned_digits(raw)?
        .parse::<u64>()
        .map(Value::U64)
        .map_err(|e| e.to_string())
}

/// Unsigned values carry no sign at all, not even `+`.
fn unsigned_digits(raw: &str) -> Result<&str, String> {
    if raw.starts_with('+') {
        return Err("unsigned values take no sign".to_string());
    }
    Ok(raw)
}

fn parse_bool(raw: &str) -> Result<Value, String> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(Value::Bool(true)),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(Value::Bool(false)),
        _ => Err("expected a boolean".to_string()),
    }
}

fn parse_f32(raw: &str) -> Result<Value, String> {
    let value = raw.parse::<f32>().map_err(|e| e.to_string())?;
    if value.is_infinite() && !is_infinity_literal(raw) {
        return Err("value out of range for a 32-bit float".to_string());
    }
    Ok(Value::F32(value))
}

fn parse_f64(raw: &str) -> Result<Value, String> {
    let value = raw.parse::<f64>().map_err(|e| e.to_string())?;
    if value.is_infinite() && !is_infinity_literal(raw) {
        return Err("value out of range for a 64-bit float".to_string());
    }
    Ok(Value::F64(value))
}

fn parse_bytes(raw: &str) -> Result<Value, String> {
    base64::engine::general_purpose::STANDARD
        .decode(raw)
        .map(|bytes| Value::Bytes(bytes.into()))
        .map_err(|e| e.to_string())
}

fn is_infinity_literal(raw: &str) -> bool {
    let unsigned = raw.trim_start_matches(['+', '-']);
    unsigned.eq_ignore_ascii_case("inf") || unsigned.eq_ignore_ascii_case("infinity")
}

fn into_map_key(value: Value) -> Option<MapKey> {
    match value {
        Value::Bool(v) => Some(MapKey::Bool(v)),
        Value::I32(v) => Some(MapKey::I32(v)),
        Value::I64(v) => Some(MapKey::I64(v)),
        Value::U32(v) => Some(MapKey::U32(v)),
        Value::U64(v) => Some(MapKey::U64(v)),
        Value::String(v) => Some(MapKey::String(v)),
        _ => None,
    }
}

fn invalid(field: &FieldDescriptor, raw: &str, reason: impl Into<String>) -> ParamError {
    ParamError::InvalidParameter {
        field: field.full_name().to_string(),
        value: raw.to_string(),
        reason: reason.into(),
    }
}

fn unsupported(field: &FieldDescriptor, kind: &Kind) -> ParamError {
    ParamError::UnsupportedFieldKind {
        field: field.full_name().to_string(),
        kind: kind_name(kind),
    }
}

fn kind_name(kind: &Kind) -> String {
    match kind {
        Kind::Message(message) => message.full_name().to_string(),
        Kind::Enum(enumeration) => enumeration.full_name().to_string(),
        scalar => format!("{scalar:?}").to_lowercase(),
    }
}
