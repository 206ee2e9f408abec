mod common;

mod bootstrap;
mod sessions;
