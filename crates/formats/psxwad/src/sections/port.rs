//! PORT (`TROP`): which level chunks belong to which zone.

use crate::cursor::Writer;
use crate::error::{Error, Result};
use crate::sections::{write_framed, Codename, SectionHeader};

const IDK_RECORD_SIZE: usize = 32;
/// Prefix, chunk count and suffix of a zone header.
const ZONE_HEADER_SIZE: usize = 12;

/// One zone and the chunks it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    /// Header bytes around the chunk count, not decoded.
    pub prefix: [u8; 2],
    pub suffix: [u8; 9],
    pub chunks: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    pub idk1: Vec<[u8; IDK_RECORD_SIZE]>,
    pub zones: Vec<Zone>,
}

impl Port {
    pub fn parse(data: &[u8], header: &SectionHeader) -> Result<Self> {
        let mut c = header.cursor(data);
        let n_zones = c.read_count()?;
        let n_idk1 = c.read_count()?;
        let mut idk1 = Vec::with_capacity(c.capacity_for(n_idk1, IDK_RECORD_SIZE));
        for _ in 0..n_idk1 {
            idk1.push(c.read_array()?);
        }

        let mut headers = Vec::with_capacity(c.capacity_for(n_zones, ZONE_HEADER_SIZE));
        for _ in 0..n_zones {
            let prefix = c.read_array()?;
            let n_chunks = c.read_u8()?;
            let suffix = c.read_array()?;
            headers.push((prefix, n_chunks, suffix));
        }
        let mut zones = Vec::with_capacity(headers.len());
        for (prefix, n_chunks, suffix) in headers {
            let chunks = (0..n_chunks)
                .map(|_| c.read_u16())
                .collect::<Result<Vec<_>>>()?;
            zones.push(Zone {
                prefix,
                suffix,
                chunks,
            });
        }
        header.expect_end(c.position())?;
        tracing::debug!(zones = zones.len(), "decoded zones");
        Ok(Self { idk1, zones })
    }

    pub fn encode(&self, w: &mut Writer) -> Result<()> {
        write_framed(w, Codename::ZONES, |w| {
            w.write_count(self.zones.len());
            w.write_count(self.idk1.len());
            for record in &self.idk1 {
                w.write_bytes(record);
            }
            for zone in &self.zones {
                let n_chunks = u8::try_from(zone.chunks.len()).map_err(|_| Error::Parse {
                    context: "PORT",
                    message: format!("zone lists {} chunks, at most 255 fit", zone.chunks.len()),
                })?;
                w.write_bytes(&zone.prefix);
                w.write_u8(n_chunks);
                w.write_bytes(&zone.suffix);
            }
            for zone in &self.zones {
                for &chunk in &zone.chunks {
                    w.write_u16(chunk);
                }
            }
            Ok(())
        })
    }

    /// Total body size implied by the contents.
    pub fn size(&self) -> usize {
        let chunks: usize = self.zones.iter().map(|z| z.chunks.len()).sum();
        8 + IDK_RECORD_SIZE * self.idk1.len() + ZONE_HEADER_SIZE * self.zones.len() + 2 * chunks
    }

    /// Zone index of each chunk id.
    pub fn zone_of(&self, chunk: u16) -> Option<usize> {
        self.zones.iter().position(|z| z.chunks.contains(&chunk))
    }
}
