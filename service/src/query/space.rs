//! [`Query`] collection related to a single [`SpaceConfiguration`].

use common::operations::By;

use crate::domain::{space, SpaceConfiguration};
#[cfg(doc)]
use crate::Query;

use super::DatabaseQuery;

/// Queries a [`SpaceConfiguration`] by its [`space::Id`].
pub type ById = DatabaseQuery<By<Option<SpaceConfiguration>, space::Id>>;
