//! Chain execution: before hooks, terminal, after hooks.

use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures_util::FutureExt;

use crate::error::Error;
use crate::http::response::default_error_response;
use crate::http::{Request, RequestInfo, Response};
use crate::middleware::{Flow, Middleware};

/// Converts an error into the response sent to the client.
pub type ErrorHandler = Arc<dyn Fn(&Error, &RequestInfo) -> Response + Send + Sync>;

/// Run `req` through `layers` around `terminal`.
///
/// Never fails: every error and panic is turned into a response by `on_error`,
/// or by the default error response if `on_error` itself panics.
pub async fn run<T, Fut>(
    layers: &[Arc<dyn Middleware>],
    mut req: Request,
    terminal: T,
    on_error: &ErrorHandler,
) -> Response
where
    T: FnOnce(Request) -> Fut + Send,
    Fut: Future<Output = Result<Response, Error>> + Send,
{
    let mut entered = 0;
    let mut early: Option<Result<Response, Error>> = None;

    for layer in layers {
        entered += 1;
        match guard(async { layer.before(&mut req).await }).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Respond(res)) => {
                tracing::debug!(middleware = layer.name(), "Middleware short-circuited request");
                early = Some(Ok(res));
                break;
            }
            Err(err) => {
                early = Some(Err(err));
                break;
            }
        }
    }

    let info = RequestInfo::from_request(&req);
    let outcome = match early {
        Some(outcome) => outcome,
        None => guard(async move { terminal(req).await }).await,
    };

    let mut response = match outcome {
        Ok(res) => res,
        Err(err) => translate(on_error, &err, &info),
    };

    for layer in layers[..entered].iter().rev() {
        if let Err(err) = guard(async { layer.after(&info, &mut response).await }).await {
            response = translate(on_error, &err, &info);
        }
    }

    response
}

/// Await `fut`, turning a panic into `Error::Panic`.
async fn guard<T, F>(fut: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => Err(Error::Panic(panic_message(panic.as_ref()))),
    }
}

/// Call `on_error`, falling back to the default JSON error if it panics.
fn translate(on_error: &ErrorHandler, err: &Error, info: &RequestInfo) -> Response {
    match panic::catch_unwind(AssertUnwindSafe(|| on_error(err, info))) {
        Ok(res) => res,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::error!(
                route = info.route_label(),
                error = %err,
                panic = %message,
                "Error handler panicked"
            );
            default_error_response(&Error::Panic(message), info)
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
