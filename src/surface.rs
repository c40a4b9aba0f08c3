/// A decoded frame as tightly packed RGBA8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surface {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Surface {
    /// Wraps `data` as a `width` x `height` surface.
    ///
    /// Returns `None` when the buffer is too small for the dimensions;
    /// trailing bytes beyond the last row are dropped.
    pub fn from_rgba(width: u32, height: u32, mut data: Vec<u8>) -> Option<Self> {
        let len = width as usize * height as usize * 4;
        if width == 0 || height == 0 || data.len() < len {
            return None;
        }
        data.truncate(len);
        Some(Surface {
            width,
            height,
            data,
        })
    }

    /// Get the size of the surface as `(width, height)`.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major RGBA bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_buffer() {
        assert!(Surface::from_rgba(2, 2, vec![0; 15]).is_none());
        assert!(Surface::from_rgba(0, 2, vec![]).is_none());
    }

    #[test]
    fn drops_padding() {
        let surface = Surface::from_rgba(2, 1, vec![7; 12]).unwrap();
        assert_eq!(surface.size(), (2, 1));
        assert_eq!(surface.as_bytes().len(), 8);
    }
}
