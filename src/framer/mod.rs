//! Frame multiplexing
//!
//! - **frame**: `Frame`, an ordered set of per-channel series
//! - **codec**: `FrameCodec`, the binary wire form of a frame
//!
//! # Example
//!
//! ```rust
//! use telemetry_client::framer::{Frame, FrameCodec};
//! use telemetry_client::telem::Series;
//!
//! let frame = Frame::from_pairs(vec![
//!     (1, Series::new(vec![1.0f64, 2.0])),
//!     (2, Series::new(vec![10u16, 20])),
//! ]).unwrap();
//!
//! let bytes = FrameCodec::encode(&frame).unwrap();
//! let decoded = FrameCodec::decode(&bytes, &frame.keys(), &frame.data_types()).unwrap();
//! assert_eq!(decoded, frame);
//! ```

pub mod codec;
pub mod frame;

pub use codec::{FrameCodec, FRAME_HEADER_SIZE, PAYLOAD_HEADER_SIZE};
pub use frame::Frame;
