//! # SOME/IP Service Discovery
//!
//! Wire types for SD messages ([`SdHeader`], [`ServiceEntry`], [`Ipv4EndpointOption`]), the
//! payload decoder, the remote service cache and the [`ServiceDiscovery`] context that ties them
//! to a transport.

pub mod entries;
pub mod machine;
pub mod options;
pub mod packet;
pub mod parser;
pub mod registry;

pub use entries::*;
pub use machine::*;
pub use options::*;
pub use packet::*;
pub use parser::{
    EntryAction, OptionAction, ReceivedService, ReceivedServices, SdError, classify_entry,
    parse_datagram, parse_payload,
};
pub use registry::{AllocationPolicy, RemoteService, RemoteServiceRegistry};
