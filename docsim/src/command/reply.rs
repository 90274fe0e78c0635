use crate::collection::Document;
use crate::errors::DocsimError;

/// Tags a failed request as `{ok: 0, errmsg, code, codeName}`.
pub fn error_reply(error: &DocsimError) -> Document {
    let mut reply = Document::new();
    reply.insert("ok", 0);
    reply.insert("errmsg", error.message());
    reply.insert("code", error.kind().code());
    reply.insert("codeName", error.kind().code_name());
    reply
}
