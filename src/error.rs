use derive_more::{Display, Error};
use std::net::SocketAddr;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not open the image store")]
    Storage,
    #[display("could not set up the resolver")]
    Setup,
    #[display("could not resolve {_0}")]
    Resolve(#[error(not(source))] String),
    #[display("could not bind to {_0}")]
    Bind(#[error(not(source))] SocketAddr),
    #[display("server stopped unexpectedly")]
    Serve,
}
