//! Response handlers: test-supplied functions that inspect the live upstream
//! response and return the response the application will see.

use crate::error::HandlerError;
use crate::message::{InterceptedRequest, InterceptedResponse};

/// Inspects and rewrites a live response.
///
/// Handlers run synchronously inside resolution of the triggering exchange,
/// so assertions and mutations are applied in request order.
pub trait ResponseHandler: Send + Sync {
    fn handle(
        &self,
        request: &InterceptedRequest,
        response: InterceptedResponse,
    ) -> Result<InterceptedResponse, HandlerError>;
}

impl<F> ResponseHandler for F
where
    F: Fn(&InterceptedRequest, InterceptedResponse) -> Result<InterceptedResponse, HandlerError>
        + Send
        + Sync,
{
    fn handle(
        &self,
        request: &InterceptedRequest,
        response: InterceptedResponse,
    ) -> Result<InterceptedResponse, HandlerError> {
        self(request, response)
    }
}

/// Adapter for handlers that only need the response.
pub(crate) struct ReplyFn<F>(pub F);

impl<F> ResponseHandler for ReplyFn<F>
where
    F: Fn(InterceptedResponse) -> Result<InterceptedResponse, HandlerError> + Send + Sync,
{
    fn handle(
        &self,
        _request: &InterceptedRequest,
        response: InterceptedResponse,
    ) -> Result<InterceptedResponse, HandlerError> {
        (self.0)(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_closure_is_handler() {
        let handler = |req: &InterceptedRequest, mut res: InterceptedResponse| {
            res.body = json!({"echo": req.url});
            Ok(res)
        };
        let out = handler
            .handle(&InterceptedRequest::get("/a"), InterceptedResponse::default())
            .unwrap();
        assert_eq!(out.body, json!({"echo": "/a"}));
    }

    #[test]
    fn test_reply_fn_ignores_request() {
        let handler = ReplyFn(|mut res: InterceptedResponse| {
            res.status_code = 418;
            Ok(res)
        });
        let out = handler
            .handle(&InterceptedRequest::get("/a"), InterceptedResponse::default())
            .unwrap();
        assert_eq!(out.status_code, 418);
    }
}
