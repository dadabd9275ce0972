#![allow(non_snake_case)]

//! Adapts plain async closures to the dispatcher's wire-level handler shape.
//!
//! Inspired by actix-web's handler factory: a closure over any supported
//! argument tuple implements [`Handler`], and [`raw_handler`] wraps it into a
//! type-erased function over `Vec<serde_json::Value>`.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::HandlerError;

/// A type-erased binding as stored by the dispatcher: raw parameter values
/// in, eventual raw result out.
pub type RawHandler =
    Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, Result<Value, HandlerError>> + Send + Sync>;

/// An async function callable with an argument tuple `Args`.
pub trait Handler<Args>: Send + Sync + Clone {
    type Output;
    type Future: Future<Output = Self::Output>;

    fn call(&self, args: Args) -> Self::Future;
}

/// Decodes the wire parameter sequence into a concrete argument tuple,
/// checking arity and per-position types.
pub trait FromParams: Sized {
    fn from_params(params: Vec<Value>) -> Result<Self, HandlerError>;
}

macro_rules! factory ({ $count:literal; $($param:ident)* } => {
    impl<Func, Fut, Out, $($param,)*> Handler<($($param,)*)> for Func
    where
        Func: Fn($($param,)*) -> Fut + Send + Sync + Clone,
        Fut: Future<Output = Out>,
    {
        type Output = Out;
        type Future = Fut;

        fn call(&self, ($($param,)*): ($($param,)*)) -> Self::Future {
            self($($param,)*)
        }
    }

    impl<$($param,)*> FromParams for ($($param,)*)
    where
        $($param: DeserializeOwned,)*
    {
        fn from_params(params: Vec<Value>) -> Result<Self, HandlerError> {
            if params.len() != $count {
                return Err(HandlerError::ParameterCount {
                    expected: $count,
                    got: params.len(),
                });
            }
            #[allow(unused_mut, unused_variables)]
            let mut params = params.into_iter().enumerate();
            Ok(($(
                {
                    let (index, value) = params.next().expect("arity checked above");
                    serde_json::from_value::<$param>(value)
                        .map_err(|source| HandlerError::InvalidParameter { index, source })?
                },
            )*))
        }
    }
});

factory! { 0; }
factory! { 1; A }
factory! { 2; A B }
factory! { 3; A B C }
factory! { 4; A B C D }
factory! { 5; A B C D E }
factory! { 6; A B C D E F }
factory! { 7; A B C D E F G }
factory! { 8; A B C D E F G H }

/// Boxes a typed handler into a [`RawHandler`]: decode the parameter
/// sequence, await the closure, serialize the return value.
pub fn raw_handler<H, Args>(handler: H) -> RawHandler
where
    H: Handler<Args> + 'static,
    H::Output: Serialize,
    H::Future: Send + 'static,
    Args: FromParams + Send + 'static,
{
    Arc::new(move |params| {
        let handler = handler.clone();
        Box::pin(async move {
            let args = Args::from_params(params)?;
            let output = handler.call(args).await;
            serde_json::to_value(output).map_err(HandlerError::Serialize)
        })
    })
}
