/// One decoded video frame: interleaved 3-channel, 8-bit pixels, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    pub const CHANNELS: usize = 3;

    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// A black frame of the given size.
    pub fn blank(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize * Self::CHANNELS;
        Self::new(width, height, vec![0; len])
    }

    /// Whether `data` holds a full `width x height` image.
    pub fn is_complete(&self) -> bool {
        self.data.len() >= self.width as usize * self.height as usize * Self::CHANNELS
    }

    /// Pixel at `(x, y)`, `None` outside the image or the buffer.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * Self::CHANNELS;
        let px = self.data.get(offset..offset + Self::CHANNELS)?;
        Some([px[0], px[1], px[2]])
    }

    pub fn fill_rect(&mut self, x0: u32, y0: u32, x1: u32, y1: u32, color: [u8; 3]) {
        for y in y0..y1.min(self.height) {
            for x in x0..x1.min(self.width) {
                let offset = (y as usize * self.width as usize + x as usize) * Self::CHANNELS;
                if let Some(px) = self.data.get_mut(offset..offset + Self::CHANNELS) {
                    px.copy_from_slice(&color);
                }
            }
        }
    }
}
