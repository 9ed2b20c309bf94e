#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(clippy::type_complexity)]

/*
 * UBX2COLLECTOR forwards U-Blox raw measurements and high precision
 * positions to a remote collector, one batch per minute.
 * This software is shipped under Mozilla Public V2 license.
 */

extern crate gnss_rs as gnss;

pub mod batch;
pub mod collecter;
pub mod device;
pub mod error;
pub mod forwarder;
pub mod frame;
pub mod message;
pub mod runtime;
pub mod status;
pub mod ubx;
pub mod utils;

pub mod prelude {
    pub use crate::{
        batch::{encode_position, encode_raw},
        collecter::{Aggregator, Closed, Stream},
        device::{Device, Interface},
        error::{Error, Result},
        forwarder::{DurableQueue, Forwarder, HttpUplink, Signer, Uplink},
        frame::{Frame, FrameReader},
        message::Message,
    };
}
