//! Abstraction over async functions of varying arity.
//!
//! [`FnTrait`] lets the router accept plain async functions with zero to
//! eight parameters; the parameter tuple is produced by the extractors in
//! [`crate::extract`].

use std::future::Future;

/// An async function callable with an argument tuple.
pub trait FnTrait<Args>: Send + Sync {
    type Output;
    type Fut: Future<Output = Self::Output> + Send;

    fn call(&self, args: Args) -> Self::Fut;
}

macro_rules! impl_fn_trait {
    ($($param:ident)*) => {
        impl<Func, Fut, $($param,)*> FnTrait<($($param,)*)> for Func
        where
            Func: Fn($($param),*) -> Fut + Send + Sync,
            Fut: Future + Send,
        {
            type Output = Fut::Output;
            type Fut = Fut;

            #[inline]
            #[allow(non_snake_case)]
            fn call(&self, ($($param,)*): ($($param,)*)) -> Self::Fut {
                (self)($($param,)*)
            }
        }
    };
}

impl_fn_trait! {}
impl_fn_trait! { A }
impl_fn_trait! { A B }
impl_fn_trait! { A B C }
impl_fn_trait! { A B C D }
impl_fn_trait! { A B C D E }
impl_fn_trait! { A B C D E F }
impl_fn_trait! { A B C D E F G }
impl_fn_trait! { A B C D E F G H }
