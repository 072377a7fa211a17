//! Structure database storage.
//!
//! A catalog is a set of record stores sharing one key space, identified by a path
//! prefix `P`:
//!
//! | Store | Data | Index | Required |
//! |-------|------|-------|----------|
//! | Amino-acid sequences | `P` | `P.index` | Yes |
//! | Names (headers) | `P_h` | `P_h.index` | No |
//! | C-alpha coordinates | `P_ca` | `P_ca.index` | No |
//! | Structural alphabet | `P_ss` | `P_ss.index` | No |
//!
//! Any data file may be split into shards `P.0`, `P.1`, ... with offsets in the index
//! running across all shards.
//!
//! ## Example
//!
//! ```rust,no_run
//! use foldscan::Catalog;
//! use std::path::Path;
//!
//! let catalog = Catalog::open(Path::new("/data/pdb")).unwrap();
//! println!("{} entries", catalog.size());
//!
//! let entry = catalog.get_by_index(0).unwrap();
//! println!("{} ({} residues)", entry.name, entry.len());
//!
//! let entry = catalog.get_by_key(12345).unwrap();
//! ```

pub mod builder;
pub mod codec;
pub mod index;
pub mod shard;
pub mod store;
