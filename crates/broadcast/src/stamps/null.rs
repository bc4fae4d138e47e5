use contracts::Stamp;

/// Stamp that reserves nothing and writes nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStamp;

impl Stamp for NullStamp {
    fn max_len(&self) -> usize {
        0
    }

    fn len(&self) -> usize {
        0
    }

    fn write_stamp(&self, _out: &mut [u8]) -> usize {
        0
    }
}
