mod common;
mod ratings;
mod sampling;
