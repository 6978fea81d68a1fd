// Copyright (C) 2022 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of gelf-notifier.
//
// gelf-notifier is free software: you can redistribute it and/or modify it under the terms of the
// GNU General Public License as published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// gelf-notifier is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without
// even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with gelf-notifier.  If
// not, see <http://www.gnu.org/licenses/>.

//! The GELF transport layer.
//!
//! This module defines the [`Transport`] trait that all implementations must support, as well
//! as the UDP implementation.
//!
//! # Examples
//!
//! To send GELF datagrams to a collector listening on port 12201 (the default) on localhost:
//!
//! ```rust
//! use gelf_notifier::transport::UdpTransport;
//! let transpo = UdpTransport::local().unwrap();
//! ```
//!
//! On a non-standard port on another host:
//!
//! ```no_run
//! use gelf_notifier::transport::UdpTransport;
//! let transpo = UdpTransport::new("graylog.domain.io:5514").unwrap();
//! ```

use crate::error::{Error, Result};

use std::{
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket},
    sync::Arc,
};

/// The port on which GELF collectors conventionally listen
pub const DEFAULT_PORT: u16 = 12201;

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                      transport mechanisms                                      //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Operations all transport layers must support.
pub trait Transport {
    /// Send one datagram on this transport mechanism.
    fn send(&self, buf: &[u8]) -> Result<usize>;
    /// Send each of `datagrams`, in order, stopping at the first failure.
    ///
    /// Each datagram is independent; there's no acknowledgement & no retry.
    fn send_datagrams(&self, datagrams: &[Vec<u8>]) -> Result<()> {
        for datagram in datagrams {
            self.send(datagram)?;
        }
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, buf: &[u8]) -> Result<usize> {
        (**self).send(buf)
    }
    fn send_datagrams(&self, datagrams: &[Vec<u8>]) -> Result<()> {
        (**self).send_datagrams(datagrams)
    }
}

/// Sending GELF messages via UDP datagrams.
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Construct a [`Transport`] implementation via UDP at `addr`.
    pub fn new<A: ToSocketAddrs>(addr: A) -> Result<UdpTransport> {
        let addr = addr
            .to_socket_addrs()
            .map_err(Error::transport)?
            .next()
            .ok_or_else(|| {
                Error::transport(std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    "no address to send to",
                ))
            })?;
        // Bind to any available port on any interface of the collector's address family...
        let local: SocketAddr = if addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).map_err(Error::transport)?;
        // and connect to the collector at `addr`:
        socket.connect(addr).map_err(Error::transport)?;
        Ok(UdpTransport { socket })
    }
    /// Construct a [`Transport`] implementation via UDP at localhost:12201
    pub fn local() -> Result<UdpTransport> {
        UdpTransport::new(("localhost", DEFAULT_PORT))
    }
    /// The address of the collector to which this transport sends
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.socket.peer_addr().map_err(Error::transport)
    }
}

impl Transport for UdpTransport {
    fn send(&self, buf: &[u8]) -> Result<usize> {
        self.socket.send(buf).map_err(Error::transport)
    }
}
