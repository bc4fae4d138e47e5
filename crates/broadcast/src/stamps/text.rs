use contracts::Stamp;

/// Constant label prefixed to every message
#[derive(Debug, Clone)]
pub struct TextStamp {
    text: Box<[u8]>,
}

impl TextStamp {
    pub fn new(text: impl AsRef<str>) -> Self {
        Self {
            text: text.as_ref().as_bytes().into(),
        }
    }

    pub fn text(&self) -> &[u8] {
        &self.text
    }
}

impl Stamp for TextStamp {
    fn max_len(&self) -> usize {
        self.text.len()
    }

    fn len(&self) -> usize {
        self.text.len()
    }

    fn write_stamp(&self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.text.len());
        out[..n].copy_from_slice(&self.text[..n]);
        n
    }
}
