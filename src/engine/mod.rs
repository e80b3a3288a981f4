// too sensitive for `Box<dyn Fn(...)>`
#![allow(clippy::type_complexity)]

pub mod error;
pub use self::error::{DynError, DynResult, Error, Result};

pub mod iterator;
pub use self::iterator::{AsyncLookahead, Lookahead};

pub mod concur;
pub use self::concur::{ConcurStream, IntoStream, IterConcur, StreamConcur};

pub mod reducer;
pub use self::reducer::{
    AsyncCombineFn, AsyncFullReducer, AsyncReducer, AsyncSemigroupReducer, CombineFn, FullReducer,
    KeyedReducer, Lookup, Reducer, SemigroupReducer,
};

pub mod reduce;
pub use self::reduce::{reduce, reduce_async, reduce_concur, try_reduce, try_reduce_async};

pub mod compose;
pub use self::compose::{Fanout, FanoutAsync, GroupBy, MapOutput};
