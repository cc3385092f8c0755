//! Service layer for ad decisioning
//!
//! This module holds the serving logic shared by the HTTP handlers:
//! zone resolution, candidate selection, upstream fetch / bid calls,
//! the VAST waterfall and the OpenRTB responder.

pub mod bidder;
pub mod campaign_pool;
pub mod fetcher;
pub mod rtb;
pub mod waterfall;
pub mod zone_store;

pub use bidder::{BidClient, BidError, HttpBidClient, PartnerBid, PartnerBidRequest};
pub use campaign_pool::{CampaignPool, ExternalCandidateCache, VastCandidateCache};
pub use fetcher::{FetchError, HttpVastFetcher, VastFetcher, validate_url};
pub use rtb::{
    Bid, BidContext, BidResponse, BidSource, PartnerBidSource, RtbResponder, RtbStatus, SeatBid,
};
pub use waterfall::{
    ClientContext, ServeError, ServeRequest, SourceKind, StageOutcome, Stamp, WaterfallResult,
    WaterfallSelector, WaterfallSettings,
};
pub use zone_store::ZoneStore;
