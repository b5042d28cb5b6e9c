//! HTTP message model: headers, trailers, bodies and the request/response wrappers.

mod body;
mod headers;
mod request;
mod response;
mod trailers;

pub use body::{
    APPLICATION_JSON, Body, BodyKind, BodyStream, OCTET_STREAM, TEXT_HTML, TEXT_PLAIN,
};
pub use headers::HttpHeaders;
pub use request::HttpRequest;
pub use response::HttpResponse;
pub use trailers::{FORBIDDEN_TRAILERS, HttpTrailers, TrailerBlock};

use strata_core::FeatureKey;

/// Feature key under which `kernel.parse` listeners store the parsed request body.
pub const REQUEST_BODY: FeatureKey = FeatureKey::named("request.body");

/// Feature key under which `kernel.serialize` listeners store the serialized response body.
pub const RESPONSE_BODY: FeatureKey = FeatureKey::named("response.body");
