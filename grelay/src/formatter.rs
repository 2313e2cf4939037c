use colored::*;
use grelay_core::{
    error::HttpResponseError,
    message::json::JsonObject,
    prost_reflect::{FieldDescriptor, Kind, MessageDescriptor},
    resolver::MethodSignature,
};
use std::fmt::Display;

/// A wrapper struct for a formatted, colored string.
///
/// Implements `Display` so it can be printed directly.
pub struct FormattedString(pub String);

pub struct GenericError<T: Display>(pub &'static str, pub T);

impl std::fmt::Display for FormattedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}", self.0)?;
        Ok(())
    }
}

impl From<serde_json::Value> for FormattedString {
    fn from(value: serde_json::Value) -> Self {
        FormattedString(serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()))
    }
}

impl From<JsonObject> for FormattedString {
    fn from(object: JsonObject) -> Self {
        FormattedString::from(serde_json::Value::Object(object))
    }
}

impl From<HttpResponseError> for FormattedString {
    fn from(err: HttpResponseError) -> Self {
        FormattedString(format!(
            "{} {}\n\n{}",
            "HTTP".red().bold(),
            err.status_code().to_string().red().bold(),
            err.body()
        ))
    }
}

impl<T: Display> From<GenericError<T>> for FormattedString {
    fn from(GenericError(msg, err): GenericError<T>) -> Self {
        FormattedString(format!("{}:\n\n'{}'", msg.red().bold(), err))
    }
}

impl From<MethodSignature> for FormattedString {
    fn from(signature: MethodSignature) -> Self {
        let mut out = format!(
            "{} {}({}) {} ({});\n{} {}\n\n",
            "rpc".cyan(),
            signature.method_name().green(),
            signature.input().full_name().yellow(),
            "returns".cyan(),
            signature.output().full_name().yellow(),
            "path".cyan(),
            signature.path()
        );

        out.push_str(&FormattedString::from(signature.input()).0);
        out.push_str("\n\n");
        out.push_str(&FormattedString::from(signature.output()).0);

        FormattedString(out)
    }
}

impl From<MessageDescriptor> for FormattedString {
    fn from(message: MessageDescriptor) -> Self {
        let mut out = format!("{} {} {{\n", "message".cyan(), message.full_name().green());

        for field in message.fields() {
            out.push_str(&format!(
                "  {} {} = {};\n",
                field_type(&field),
                field.name(),
                field.number()
            ));
        }

        out.push('}');
        FormattedString(out)
    }
}

fn field_type(field: &FieldDescriptor) -> String {
    if let Kind::Message(entry) = field.kind()
        && field.is_map()
    {
        let key = kind_name(&entry.map_entry_key_field().kind());
        let value = kind_name(&entry.map_entry_value_field().kind());
        return format!("{}{}, {}{}", "map<".cyan(), key, value, ">".cyan());
    }

    let kind = kind_name(&field.kind());
    if field.is_list() {
        format!("{} {}", "repeated".cyan(), kind)
    } else {
        kind.to_string()
    }
}

fn kind_name(kind: &Kind) -> ColoredString {
    match kind {
        Kind::Double => "double".yellow(),
        Kind::Float => "float".yellow(),
        Kind::Int32 => "int32".yellow(),
        Kind::Int64 => "int64".yellow(),
        Kind::Uint32 => "uint32".yellow(),
        Kind::Uint64 => "uint64".yellow(),
        Kind::Sint32 => "sint32".yellow(),
        Kind::Sint64 => "sint64".yellow(),
        Kind::Fixed32 => "fixed32".yellow(),
        Kind::Fixed64 => "fixed64".yellow(),
        Kind::Sfixed32 => "sfixed32".yellow(),
        Kind::Sfixed64 => "sfixed64".yellow(),
        Kind::Bool => "bool".yellow(),
        Kind::String => "string".yellow(),
        Kind::Bytes => "bytes".yellow(),
        Kind::Message(m) => m.full_name().yellow(),
        Kind::Enum(e) => e.full_name().yellow(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grelay_core::resolver::resolve;

    #[test]
    fn describes_a_method() {
        colored::control::set_override(false);

        let pool = greeter_service::descriptor_pool();
        let signature = resolve(&pool, greeter_service::SAY_HELLO).unwrap();
        let out = FormattedString::from(signature).0;

        assert!(out.contains("rpc SayHello(pkg.HelloRequest) returns (pkg.HelloReply);"));
        assert!(out.contains("path /pkg.Greeter/SayHello"));
        assert!(out.contains("map<string, int32> tags = 13;"));
        assert!(out.contains("map<int32, string> codes = 20;"));
        assert!(out.contains("repeated int32 numbers = 12;"));
        assert!(out.contains("pkg.Address address = 11;"));
        assert!(out.contains("string request_id = 2;"));
    }

    #[test]
    fn http_error_shows_status_and_body() {
        colored::control::set_override(false);

        let err = HttpResponseError::new(http::StatusCode::NOT_FOUND);
        let out = FormattedString::from(err).0;

        assert!(out.starts_with("HTTP 404 Not Found"));
        assert!(out.ends_with(r#"{"errors":{"message":"Not Found"}}"#));
    }
}
