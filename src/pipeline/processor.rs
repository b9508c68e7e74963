use crate::{
    http::{request::Request, response::Response},
    routing::rule::BoundArgs,
};

/// A middleware layer.
///
/// Both hooks have pass-through defaults, so a processor only implements
/// the side it cares about. The [`Handler`](crate::Handler) drives the
/// hooks and the inner layers in between.
///
/// # Examples
/// ```
/// use relay_web::{Processor, Request, Response, StatusCode};
///
/// struct RequireToken;
///
/// impl Processor for RequireToken {
///     fn before(&self, req: &mut Request) -> Option<Response> {
///         if req.has_header("authorization") {
///             return None;
///         }
///
///         let mut resp = Response::new();
///         resp.status(StatusCode::Unauthorized);
///         Some(resp)
///     }
///
///     fn after(&self, _: &Request, mut resp: Response) -> Response {
///         resp.set_header("x-checked", "1").unwrap();
///         resp
///     }
/// }
/// ```
pub trait Processor: Send + Sync {
    /// Runs on the way in. Returning a response stops the chain: neither
    /// the inner layers nor this layer's [`after`](Processor::after) run.
    #[inline]
    fn before(&self, request: &mut Request) -> Option<Response> {
        let _ = request;
        None
    }

    /// Runs on the way out with the response of the inner layers.
    #[inline]
    fn after(&self, request: &Request, response: Response) -> Response {
        let _ = request;
        response
    }
}

/// The innermost step of a pipeline.
///
/// Implemented for any `Fn(&mut Request, &BoundArgs) -> Response`.
pub trait Action: Send + Sync {
    fn call(&self, request: &mut Request, args: &BoundArgs) -> Response;
}

impl<F> Action for F
where
    F: Fn(&mut Request, &BoundArgs) -> Response + Send + Sync,
{
    #[inline]
    fn call(&self, request: &mut Request, args: &BoundArgs) -> Response {
        self(request, args)
    }
}
