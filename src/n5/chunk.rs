/// The binary header at the start of every N5 chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct N5ChunkHeader {
    pub(crate) mode: N5ChunkMode,
    /// Column-major, i.e. the reverse of the Zarr chunk shape.
    pub(crate) shape: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub(crate) enum N5ChunkMode {
    Default = 0,
    #[allow(unused)]
    VarLen {
        num_el: u32,
    } = 1,
    Object = 2,
}

impl N5ChunkMode {
    fn discriminant(&self) -> u16 {
        match self {
            N5ChunkMode::Default => 0,
            N5ChunkMode::VarLen { .. } => 1,
            N5ChunkMode::Object => 2,
        }
    }
}

fn take<const N: usize>(bytes: &[u8], offset: &mut usize) -> crate::Result<[u8; N]> {
    let out = bytes
        .get(*offset..*offset + N)
        .ok_or_else(|| {
            crate::Error::general(format!(
                "N5 chunk header truncated at byte {} of {}",
                *offset,
                bytes.len()
            ))
        })?
        .try_into()
        .map_err(crate::Error::wrap)?;
    *offset += N;
    Ok(out)
}

impl N5ChunkHeader {
    /// Header for a default-mode chunk with the given C-order shape.
    pub fn new_default(c_order_shape: &[u64]) -> crate::Result<Self> {
        let shape = c_order_shape
            .iter()
            .rev()
            .map(|&n| {
                u32::try_from(n)
                    .map_err(|_| crate::Error::general(format!("N5 chunk dimension {n} too large")))
            })
            .collect::<crate::Result<Vec<_>>>()?;
        Ok(Self {
            mode: N5ChunkMode::Default,
            shape,
        })
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        let mut offset: usize = 0;

        let mode_num = u16::from_be_bytes(take(bytes, &mut offset)?);
        let ndim = u16::from_be_bytes(take(bytes, &mut offset)?);
        let mut shape = Vec::with_capacity(ndim as usize);
        for _ in 0..ndim {
            shape.push(u32::from_be_bytes(take(bytes, &mut offset)?));
        }

        let mode = match mode_num {
            0 => N5ChunkMode::Default,
            1 => {
                let num_el = u32::from_be_bytes(take(bytes, &mut offset)?);
                N5ChunkMode::VarLen { num_el }
            }
            2 => N5ChunkMode::Object,
            n => return Err(crate::Error::general(format!("invalid N5 chunk mode {n}"))),
        };
        Ok(N5ChunkHeader { mode, shape })
    }

    /// Big-endian serialization; exactly [`data_offset`](Self::data_offset) bytes.
    pub(crate) fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        let ndim = u16::try_from(self.shape.len())
            .map_err(|_| crate::Error::general("too many dimensions for an N5 chunk"))?;
        let mut out = Vec::with_capacity(self.data_offset());
        out.extend_from_slice(&self.mode.discriminant().to_be_bytes());
        out.extend_from_slice(&ndim.to_be_bytes());
        for s in &self.shape {
            out.extend_from_slice(&s.to_be_bytes());
        }
        if let N5ChunkMode::VarLen { num_el } = self.mode {
            out.extend_from_slice(&num_el.to_be_bytes());
        }
        Ok(out)
    }

    pub(crate) fn data_offset(&self) -> usize {
        size_of::<u16>()  // mode discriminator
            + size_of::<u16>() // ndim
            + self.shape.len() * size_of::<u32>()  // shape
            + match self.mode {
                N5ChunkMode::VarLen { .. } => size_of::<u32>(),
                _ => 0,
            }
    }
}
