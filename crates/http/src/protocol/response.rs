use http::Response;

/// The status line and header block of an HTTP response.
///
/// `http::Response<()>` with an empty body placeholder; the payload travels
/// separately as [`super::PayloadItem`]s once the framing has been decided.
pub type ResponseHead = Response<()>;
