//! # Greeter Service
//!
//! **INTERNAL USE ONLY**: This crate exists solely to provide a gRPC server implementation
//! and descriptor set for testing `grelay_core`.
//! It is not intended for production use.
//!
//! The descriptor set is assembled in code from `prost-types` so that tests do not depend on
//! `protoc` being installed. It mirrors the following schema, split over two files so that
//! cross-file type references are exercised:
//!
//! ```proto
//! // pkg/types.proto
//! enum Mood { MOOD_UNSPECIFIED = 0; HAPPY = 1; SAD = 2; }
//! message Address { string city = 1; int32 zip = 2; }
//!
//! // pkg/greeter.proto
//! message HelloRequest {
//!   string name = 1;  int32 count = 2;  int64 big = 3;  uint32 small = 4;
//!   uint64 huge = 5;  bool loud = 6;    float ratio = 7; double score = 8;
//!   bytes payload = 9; Mood mood = 10;  Address address = 11;
//!   repeated int32 numbers = 12;        map<string, int32> tags = 13;
//!   map<string, Address> places = 14;   repeated Mood moods = 15;
//!   repeated Address history = 16;      HelloRequest next = 17;
//!   string display_name = 18;           map<string, string> labels = 19;
//!   map<int32, string> codes = 20;      map<bool, Mood> switches = 21;
//! }
//! message HelloReply { string message = 1; string request_id = 2; }
//! service Greeter {
//!   rpc SayHello(HelloRequest) returns (HelloReply);
//!   rpc SayHelloStream(HelloRequest) returns (stream HelloReply);
//! }
//! ```
mod server;

pub use server::GreeterServer;

use prost::Message;
use prost_reflect::DescriptorPool;
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, FileDescriptorSet, MessageOptions, MethodDescriptorProto,
    ServiceDescriptorProto,
    field_descriptor_proto::{Label, Type},
};

pub const SERVICE: &str = "pkg.Greeter";
pub const SAY_HELLO: &str = "pkg.Greeter/SayHello";
pub const SAY_HELLO_STREAM: &str = "pkg.Greeter/SayHelloStream";

/// Builds the descriptor set described in the crate documentation.
pub fn file_descriptor_set() -> FileDescriptorSet {
    FileDescriptorSet {
        file: vec![types_file(), greeter_file()],
    }
}

/// The descriptor set encoded the same way `protoc --descriptor_set_out` would write it.
pub fn encoded_file_descriptor_set() -> Vec<u8> {
    file_descriptor_set().encode_to_vec()
}

pub fn descriptor_pool() -> DescriptorPool {
    DescriptorPool::from_file_descriptor_set(file_descriptor_set())
        .expect("Greeter descriptor set must be valid")
}

fn types_file() -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some("pkg/types.proto".to_string()),
        package: Some("pkg".to_string()),
        syntax: Some("proto3".to_string()),
        enum_type: vec![EnumDescriptorProto {
            name: Some("Mood".to_string()),
            value: vec![
                enum_value("MOOD_UNSPECIFIED", 0),
                enum_value("HAPPY", 1),
                enum_value("SAD", 2),
            ],
            ..Default::default()
        }],
        message_type: vec![DescriptorProto {
            name: Some("Address".to_string()),
            field: vec![
                scalar("city", 1, Type::String),
                scalar("zip", 2, Type::Int32),
            ],
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn greeter_file() -> FileDescriptorProto {
    let hello_request = DescriptorProto {
        name: Some("HelloRequest".to_string()),
        field: vec![
            scalar("name", 1, Type::String),
            scalar("count", 2, Type::Int32),
            scalar("big", 3, Type::Int64),
            scalar("small", 4, Type::Uint32),
            scalar("huge", 5, Type::Uint64),
            scalar("loud", 6, Type::Bool),
            scalar("ratio", 7, Type::Float),
            scalar("score", 8, Type::Double),
            scalar("payload", 9, Type::Bytes),
            typed("mood", 10, Type::Enum, ".pkg.Mood"),
            typed("address", 11, Type::Message, ".pkg.Address"),
            repeated(scalar("numbers", 12, Type::Int32)),
            repeated(typed("tags", 13, Type::Message, ".pkg.HelloRequest.TagsEntry")),
            repeated(typed("places", 14, Type::Message, ".pkg.HelloRequest.PlacesEntry")),
            repeated(typed("moods", 15, Type::Enum, ".pkg.Mood")),
            repeated(typed("history", 16, Type::Message, ".pkg.Address")),
            typed("next", 17, Type::Message, ".pkg.HelloRequest"),
            scalar("display_name", 18, Type::String),
            repeated(typed("labels", 19, Type::Message, ".pkg.HelloRequest.LabelsEntry")),
            repeated(typed("codes", 20, Type::Message, ".pkg.HelloRequest.CodesEntry")),
            repeated(typed("switches", 21, Type::Message, ".pkg.HelloRequest.SwitchesEntry")),
        ],
        nested_type: vec![
            map_entry("TagsEntry", Type::String, scalar("value", 2, Type::Int32)),
            map_entry(
                "PlacesEntry",
                Type::String,
                typed("value", 2, Type::Message, ".pkg.Address"),
            ),
            map_entry("LabelsEntry", Type::String, scalar("value", 2, Type::String)),
            map_entry("CodesEntry", Type::Int32, scalar("value", 2, Type::String)),
            map_entry(
                "SwitchesEntry",
                Type::Bool,
                typed("value", 2, Type::Enum, ".pkg.Mood"),
            ),
        ],
        ..Default::default()
    };

    let hello_reply = DescriptorProto {
        name: Some("HelloReply".to_string()),
        field: vec![
            scalar("message", 1, Type::String),
            scalar("request_id", 2, Type::String),
        ],
        ..Default::default()
    };

    FileDescriptorProto {
        name: Some("pkg/greeter.proto".to_string()),
        package: Some("pkg".to_string()),
        syntax: Some("proto3".to_string()),
        dependency: vec!["pkg/types.proto".to_string()],
        message_type: vec![hello_request, hello_reply],
        service: vec![ServiceDescriptorProto {
            name: Some("Greeter".to_string()),
            method: vec![
                method("SayHello", false),
                method("SayHelloStream", true),
            ],
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn scalar(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(ty as i32),
        json_name: Some(json_name(name)),
        ..Default::default()
    }
}

fn typed(name: &str, number: i32, ty: Type, type_name: &str) -> FieldDescriptorProto {
    FieldDescriptorProto {
        type_name: Some(type_name.to_string()),
        ..scalar(name, number, ty)
    }
}

fn repeated(field: FieldDescriptorProto) -> FieldDescriptorProto {
    FieldDescriptorProto {
        label: Some(Label::Repeated as i32),
        ..field
    }
}

fn map_entry(name: &str, key: Type, value: FieldDescriptorProto) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field: vec![scalar("key", 1, key), value],
        options: Some(MessageOptions {
            map_entry: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn enum_value(name: &str, number: i32) -> EnumValueDescriptorProto {
    EnumValueDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        ..Default::default()
    }
}

fn method(name: &str, server_streaming: bool) -> MethodDescriptorProto {
    MethodDescriptorProto {
        name: Some(name.to_string()),
        input_type: Some(".pkg.HelloRequest".to_string()),
        output_type: Some(".pkg.HelloReply".to_string()),
        client_streaming: Some(false),
        server_streaming: Some(server_streaming),
        ..Default::default()
    }
}

// Same lowerCamelCase conversion protoc applies when filling `json_name`.
fn json_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
