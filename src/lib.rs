//! kubeauth adds users backed by service accounts and validates kubectl
//! impersonation targets before passing commands through.
//!
//! The core is the identity resolution engine in [`identity`]: a set of
//! queriers which each know one place identities can live, fanned out in
//! parallel over a shared [`cluster::Clientset`].

pub mod add_user;
pub mod cluster;
pub mod ctl;
pub mod error;
pub mod exec;
pub mod identity;
pub mod kinds;
pub mod kubeconfig;
pub mod names;

#[cfg(test)]
pub mod testkit;

pub use error::{Error, Result};
