use bytes::Bytes;
use hpack::{Decoder, Encoder};

use crate::types::{H2ConnectionErrorKind, Header, ProtocolError};

/// Bounds on a single HPACK decode used to detect "HPACK bomb" payloads: a
/// small compressed block that expands into a disproportionately large or
/// numerous set of headers. The `hpack` crate has no hooks for these, so
/// they're re-derived from its decoded output after the fact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HpackSecurityLimits {
    pub max_decompressed_size: usize,
    pub max_header_count: usize,
    pub max_string_length: usize,
    pub max_dynamic_table_size: usize,
    pub compression_ratio_limit: f64,
}

impl Default for HpackSecurityLimits {
    fn default() -> Self {
        Self {
            max_decompressed_size: 65_536,
            max_header_count: 100,
            max_string_length: 8_192,
            max_dynamic_table_size: 65_536,
            compression_ratio_limit: 10.0,
        }
    }
}

pub struct HpackCodec {
    encoder: Encoder<'static>,
    decoder: Decoder<'static>,
    encoder_max_table_size: usize,
    decoder_max_table_size: usize,
    limits: HpackSecurityLimits,
}

impl HpackCodec {
    pub fn new(encoder_max_table_size: usize, decoder_max_table_size: usize) -> Self {
        Self::with_limits(
            encoder_max_table_size,
            decoder_max_table_size,
            HpackSecurityLimits::default(),
        )
    }

    pub fn with_limits(
        encoder_max_table_size: usize,
        decoder_max_table_size: usize,
        limits: HpackSecurityLimits,
    ) -> Self {
        let mut codec = Self {
            encoder: Encoder::new(),
            decoder: Decoder::new(),
            encoder_max_table_size,
            decoder_max_table_size,
            limits,
        };
        codec.apply_decoder_table_size(decoder_max_table_size.min(limits.max_dynamic_table_size));
        codec
    }

    pub fn set_encoder_max_table_size(&mut self, size: usize) {
        self.encoder_max_table_size = size;
        // The hpack encoder crate does not expose an API to bound the dynamic
        // table size directly; this value is tracked so we can emit SETTINGS
        // updates when necessary.
    }

    pub fn set_decoder_max_table_size(&mut self, size: usize) {
        self.decoder_max_table_size = size;
        self.apply_decoder_table_size(size);
    }

    pub fn encoder_max_table_size(&self) -> usize {
        self.encoder_max_table_size
    }

    pub fn decoder_max_table_size(&self) -> usize {
        self.decoder_max_table_size
    }

    pub fn encode(&mut self, headers: &[Header]) -> Result<Bytes, ProtocolError> {
        let header_tuples = headers
            .iter()
            .map(|h| {
                let name = h.name.as_bytes();
                let value = h.value.as_ref().map(|v| v.as_bytes()).unwrap_or(&[]);
                (name, value)
            })
            .collect::<Vec<_>>();

        let encoded = self.encoder.encode(header_tuples);
        Ok(Bytes::from(encoded))
    }

    pub fn decode(&mut self, payload: &[u8]) -> Result<Vec<Header>, ProtocolError> {
        let entries = self.decoder.decode(payload).map_err(|err| {
            ProtocolError::H2CompressionError(format!("HPACK decode error: {:?}", err))
        })?;

        self.check_bomb_limits(payload.len(), &entries)?;

        entries
            .into_iter()
            .map(|(name, value)| Self::into_header(name, value))
            .collect()
    }

    fn check_bomb_limits(
        &self,
        compressed_len: usize,
        entries: &[(Vec<u8>, Vec<u8>)],
    ) -> Result<(), ProtocolError> {
        if entries.len() > self.limits.max_header_count {
            return Err(H2ConnectionErrorKind::HpackBomb(format!(
                "decoded {} headers, limit is {}",
                entries.len(),
                self.limits.max_header_count
            ))
            .into());
        }

        let mut decompressed_size = 0usize;
        for (name, value) in entries {
            if name.len() > self.limits.max_string_length || value.len() > self.limits.max_string_length
            {
                return Err(H2ConnectionErrorKind::HpackBomb(format!(
                    "header string exceeds limit of {} bytes",
                    self.limits.max_string_length
                ))
                .into());
            }
            decompressed_size += name.len() + value.len();
        }

        if decompressed_size > self.limits.max_decompressed_size {
            return Err(H2ConnectionErrorKind::HpackBomb(format!(
                "decoded header block is {} bytes, limit is {}",
                decompressed_size, self.limits.max_decompressed_size
            ))
            .into());
        }

        if compressed_len > 0 {
            let ratio = decompressed_size as f64 / compressed_len as f64;
            if ratio > self.limits.compression_ratio_limit {
                return Err(H2ConnectionErrorKind::HpackBomb(format!(
                    "compression ratio {:.1} exceeds limit of {:.1}",
                    ratio, self.limits.compression_ratio_limit
                ))
                .into());
            }
        }

        Ok(())
    }

    fn into_header(name: Vec<u8>, value: Vec<u8>) -> Result<Header, ProtocolError> {
        let name_str = String::from_utf8(name).map_err(|e| {
            ProtocolError::HeaderEncodingError(format!("Invalid UTF-8 in header name: {}", e))
        })?;
        let value = if value.is_empty() {
            None
        } else {
            Some(String::from_utf8(value).map_err(|e| {
                ProtocolError::HeaderEncodingError(format!("Invalid UTF-8 in header value: {}", e))
            })?)
        };

        Ok(Header {
            name: name_str,
            value,
        })
    }

    fn apply_decoder_table_size(&mut self, size: usize) {
        self.decoder.set_max_table_size(size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> Vec<Header> {
        pairs
            .iter()
            .map(|(n, v)| Header {
                name: n.to_string(),
                value: Some(v.to_string()),
            })
            .collect()
    }

    #[test]
    fn encode_decode_round_trips() {
        let mut encoder = HpackCodec::new(4096, 4096);
        let mut decoder = HpackCodec::new(4096, 4096);

        let sent = headers(&[(":method", "GET"), (":path", "/"), ("x-custom", "value")]);
        let encoded = encoder.encode(&sent).unwrap();
        let decoded = decoder.decode(&encoded).unwrap();

        assert_eq!(decoded, sent);
    }

    #[test]
    fn dynamic_table_carries_state_across_calls() {
        let mut encoder = HpackCodec::new(4096, 4096);
        let mut decoder = HpackCodec::new(4096, 4096);

        let first = headers(&[(":method", "GET"), ("authorization", "secret-token")]);
        let second = headers(&[(":method", "GET"), ("authorization", "secret-token")]);

        let e1 = encoder.encode(&first).unwrap();
        let e2 = encoder.encode(&second).unwrap();
        // A header repeated across calls compresses better once it's in the
        // dynamic table, so the second frame should be no larger than the first.
        assert!(e2.len() <= e1.len());

        assert_eq!(decoder.decode(&e1).unwrap(), first);
        assert_eq!(decoder.decode(&e2).unwrap(), second);
    }

    #[test]
    fn decode_rejects_excessive_header_count() {
        let limits = HpackSecurityLimits {
            max_header_count: 1,
            ..HpackSecurityLimits::default()
        };
        let mut encoder = HpackCodec::new(4096, 4096);
        let mut decoder = HpackCodec::with_limits(4096, 4096, limits);

        let sent = headers(&[("a", "1"), ("b", "2")]);
        let encoded = encoder.encode(&sent).unwrap();

        let err = decoder.decode(&encoded).unwrap_err();
        assert!(matches!(err, ProtocolError::H2ConnectionError(H2ConnectionErrorKind::HpackBomb(_))));
    }

    #[test]
    fn decode_rejects_oversized_header_string() {
        let limits = HpackSecurityLimits {
            max_string_length: 4,
            ..HpackSecurityLimits::default()
        };
        let mut encoder = HpackCodec::new(4096, 4096);
        let mut decoder = HpackCodec::with_limits(4096, 4096, limits);

        let sent = headers(&[("x-long", "this-value-is-too-long")]);
        let encoded = encoder.encode(&sent).unwrap();

        let err = decoder.decode(&encoded).unwrap_err();
        assert!(matches!(err, ProtocolError::H2ConnectionError(H2ConnectionErrorKind::HpackBomb(_))));
    }

    #[test]
    fn empty_value_decodes_to_none() {
        let mut encoder = HpackCodec::new(4096, 4096);
        let mut decoder = HpackCodec::new(4096, 4096);

        let sent = vec![Header { name: "x-empty".to_string(), value: None }];
        let encoded = encoder.encode(&sent).unwrap();
        let decoded = decoder.decode(&encoded).unwrap();

        assert_eq!(decoded[0].value, None);
    }
}
