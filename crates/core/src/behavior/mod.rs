//! Behavior scoring.
//!
//! The pipeline is deliberately small:
//!
//! ```text
//! BehaviorSample ──► BehaviorAggregate (running sums, flushed periodically)
//!        │
//!        └─► features ──► DenseNetwork::fit / predict ──► conversion score
//!                                                              │
//!                       messaging tables (urgency, CTA, price) ◄┘
//! ```
//!
//! Nothing here performs I/O. The storefront crate owns storage, timers and
//! the shared trained model.

pub mod aggregate;
pub mod messaging;
pub mod network;
pub mod sample;
pub mod schedule;

pub use aggregate::{BehaviorAggregate, BehaviorAverages, BehaviorWindow};
pub use messaging::{
    CtaOffer, PriceAdjustment, SocialProof, Testimonial, TestimonialCategory, UrgencyTier,
    cta_for, price_for, recommend, select_testimonial, social_proof, testimonial_category,
    urgency_for,
};
pub use network::{DenseNetwork, FitOptions, FitReport, NetworkError};
pub use sample::{BehaviorSample, INTENT_FEATURES, PRICING_FEATURES};
pub use schedule::{TrainingProgress, TrainingSchedule, TrainingStep};
