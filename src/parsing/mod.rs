//! Parsers for structure records.
//!
//! Structures enter the tool as JSON records, either one record (a query) or an array
//! of records (input for a catalog build):
//!
//! ```json
//! [
//!   {"key": 1, "name": "1abc_A", "sequence": "MKV", "symbolic_sequence": "DPV",
//!    "coordinates": [[11.2, 4.0, -3.1], [13.9, 6.4, -2.2], [17.5, 5.8, -1.0]]}
//! ]
//! ```
//!
//! | Field | Description | Required |
//! |-------|-------------|----------|
//! | key | Catalog key; assigned in input order when missing | No |
//! | name | Header line | No |
//! | sequence | Amino-acid sequence | Yes |
//! | symbolic_sequence | Structural-alphabet sequence, same length | No |
//! | coordinates | One `[x, y, z]` C-alpha position per residue | For queries |
//!
//! ## Example
//!
//! ```rust,no_run
//! use foldscan::parsing::records::parse_query_file;
//! use std::path::Path;
//!
//! let query = parse_query_file(Path::new("query.json")).unwrap();
//! println!("{} ({} residues)", query.name, query.len());
//! ```

pub mod records;
