//! LSDP wire format.
//!
//! A packet is a 6-byte header followed by length-prefixed messages:
//!
//! ```text
//! header:   [hdr_len=6]['L' 'S' 'D' 'P'][version]
//! query:    [len]['Q'][subtype][class:u16 BE]
//! announce: [len]['A'][node_len][node_id..][addr_len=4][ipv4 x4][count]
//!           count x { [class:u16 BE][txt_count]
//!                     txt_count x { [key_len][key..][val_len][val..] } }
//! ```
//!
//! Packets arrive from an untrusted broadcast domain. Every length field is
//! re-checked against the bytes that remain; a bad announce is dropped
//! without affecting the rest of the packet.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

/// Minimum (and current) header length.
pub const HEADER_LEN: usize = 6;

/// Header magic.
pub const MAGIC: &[u8; 4] = b"LSDP";

/// Protocol version we send.
pub const PROTOCOL_VERSION: u8 = 1;

/// Announce message type.
pub const MSG_ANNOUNCE: u8 = b'A';

/// Query message type.
pub const MSG_QUERY: u8 = b'Q';

/// Wildcard class used to query every device class.
pub const CLASS_ALL: u16 = 0xFFFF;

/// Query for every device class, as the vendor controller app sends it.
pub const QUERY_ALL: [u8; 11] = [
    6,
    MAGIC[0],
    MAGIC[1],
    MAGIC[2],
    MAGIC[3],
    PROTOCOL_VERSION,
    5,
    MSG_QUERY,
    1,
    0xFF,
    0xFF,
];

/// One decoded announce message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announce {
    /// Opaque node identity (usually a MAC address).
    pub node_id: Vec<u8>,
    pub address: Ipv4Addr,
    pub records: Vec<Record>,
}

/// One class record inside an announce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub class: u16,
    pub txt: BTreeMap<String, String>,
}

/// Parse a packet into its announce messages.
///
/// Returns `None` when the header is invalid. A valid header with no
/// announces yields an empty list.
pub fn parse_packet(packet: &[u8]) -> Option<Vec<Announce>> {
    if packet.len() < HEADER_LEN {
        return None;
    }
    let header_len = usize::from(packet[0]);
    if header_len < HEADER_LEN || header_len > packet.len() {
        return None;
    }
    if &packet[1..5] != MAGIC {
        return None;
    }

    let mut announces = Vec::new();
    let mut pos = header_len;
    while pos < packet.len() {
        let len = usize::from(packet[pos]);
        if len == 0 || pos + len > packet.len() {
            break;
        }
        let message = &packet[pos..pos + len];
        pos += len;

        if message.len() < 2 || message[1] != MSG_ANNOUNCE {
            continue;
        }
        if let Some(announce) = parse_announce(message) {
            announces.push(announce);
        }
    }
    Some(announces)
}

/// Parse one announce message (including its length and type bytes).
fn parse_announce(message: &[u8]) -> Option<Announce> {
    let mut reader = Reader::new(message.get(2..)?);

    let node_len = reader.u8()?;
    let node_id = reader.bytes(usize::from(node_len))?.to_vec();

    let addr_len = reader.u8()?;
    if addr_len != 4 {
        return None;
    }
    let octets = reader.bytes(4)?;
    let address = Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]);

    let count = reader.u8()?;
    let mut records = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let class = reader.u16_be()?;
        let txt_count = reader.u8()?;
        let mut txt = BTreeMap::new();
        for _ in 0..txt_count {
            let key = reader.short_string()?;
            let value = reader.short_string()?;
            if !key.is_empty() {
                txt.insert(key, value);
            }
        }
        records.push(Record { class, txt });
    }

    Some(Announce {
        node_id,
        address,
        records,
    })
}

/// Encode a packet carrying a single announce.
///
/// Returns `None` if a field does not fit its one-byte length prefix.
pub fn encode_announce(announce: &Announce) -> Option<Vec<u8>> {
    let mut body = vec![0, MSG_ANNOUNCE];
    push_short(&mut body, &announce.node_id)?;
    body.push(4);
    body.extend_from_slice(&announce.address.octets());
    body.push(u8::try_from(announce.records.len()).ok()?);
    for record in &announce.records {
        body.extend_from_slice(&record.class.to_be_bytes());
        body.push(u8::try_from(record.txt.len()).ok()?);
        for (key, value) in &record.txt {
            push_short(&mut body, key.as_bytes())?;
            push_short(&mut body, value.as_bytes())?;
        }
    }
    body[0] = u8::try_from(body.len()).ok()?;

    let mut packet = Vec::with_capacity(HEADER_LEN + body.len());
    packet.extend_from_slice(&QUERY_ALL[..HEADER_LEN]);
    packet.extend_from_slice(&body);
    Some(packet)
}

fn push_short(buf: &mut Vec<u8>, bytes: &[u8]) -> Option<()> {
    buf.push(u8::try_from(bytes.len()).ok()?);
    buf.extend_from_slice(bytes);
    Some(())
}

/// Bounds-checked cursor over a message body.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn u8(&mut self) -> Option<u8> {
        let byte = *self.buf.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    fn u16_be(&mut self) -> Option<u16> {
        let bytes = self.bytes(2)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let bytes = self.buf.get(self.pos..end)?;
        self.pos = end;
        Some(bytes)
    }

    fn short_string(&mut self) -> Option<String> {
        let len = self.u8()?;
        let bytes = self.bytes(usize::from(len))?;
        Some(String::from_utf8_lossy(bytes).into_owned())
    }
}
