//! Protobuf schema of the Stubby gRPC API.

mod convert;

pub mod shortener {
    pub mod v1 {
        tonic::include_proto!("shortener.v1");
    }
}

pub mod v1 {
    pub use crate::convert::parse_short_code;
    pub use crate::shortener::v1::*;
}
