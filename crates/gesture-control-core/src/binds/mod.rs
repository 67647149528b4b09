mod bind;
mod store;

pub use {
    bind::{Bind, BindMode},
    store::BindStore,
};
