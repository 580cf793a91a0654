//! # ctl-directory
//!
//! Converts upstream records into a site's directory tree.
//!
//! Everything here is a pure function of its inputs: the same records and
//! configuration always yield the same entries in the same order (the root
//! DSE's random `entryuuid` being the only exception).
//!
//! - [`user`] - persons to user entries, configured attributes
//! - [`group`] - groups and roles to group entries
//! - [`wiring`] - bidirectional membership links
//! - [`tree`] - root skeleton, admin entries, full build

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod group;
pub mod tree;
pub mod user;
pub mod wiring;

pub use error::{TransformError, TransformResult};
pub use group::{group_entries_without_members, transform_group, transform_role};
pub use tree::{
    add_users_admin_group, admin_entry, admin_group, build_directory, root_tree, DirectoryData,
};
pub use user::{add_config_attributes, transform_user, unique_emails, user_identifier};
pub use wiring::{
    connect_users_and_groups, drop_duplicate_dns, membership_matches, prune_empty_groups,
};
