//! Letterbox geometry between source frames and square detector inputs.

/// Describes how a frame was resized and padded into a square detector input.
///
/// Computed once per video; used to map detector boxes back into source-frame
/// coordinates, the space counting lines are defined in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaddingInfo {
    pub top_pad: u32,
    pub bottom_pad: u32,
    pub left_pad: u32,
    pub right_pad: u32,
    /// (width, height)
    pub original_size: (u32, u32),
    pub resized_size: (u32, u32),
    pub padded_size: (u32, u32),
}

impl PaddingInfo {
    /// Fit the long side to `target_size`, keep the aspect ratio and pad the
    /// short side, putting any odd pixel on the bottom/right.
    pub fn calculate(original_width: u32, original_height: u32, target_size: u32) -> Self {
        let (ow, oh, t) = (original_width as u64, original_height as u64, target_size as u64);

        if original_width > original_height {
            let new_height = (t * oh / ow.max(1)) as u32;
            let top_pad = (target_size - new_height) / 2;
            Self {
                top_pad,
                bottom_pad: target_size - new_height - top_pad,
                left_pad: 0,
                right_pad: 0,
                original_size: (original_width, original_height),
                resized_size: (target_size, new_height),
                padded_size: (target_size, target_size),
            }
        } else {
            let new_width = (t * ow / oh.max(1)) as u32;
            let left_pad = (target_size - new_width) / 2;
            Self {
                top_pad: 0,
                bottom_pad: 0,
                left_pad,
                right_pad: target_size - new_width - left_pad,
                original_size: (original_width, original_height),
                resized_size: (new_width, target_size),
                padded_size: (target_size, target_size),
            }
        }
    }

    /// Identity mapping for detectors that already work in source space.
    pub fn identity(width: u32, height: u32) -> Self {
        Self {
            top_pad: 0,
            bottom_pad: 0,
            left_pad: 0,
            right_pad: 0,
            original_size: (width, height),
            resized_size: (width, height),
            padded_size: (width, height),
        }
    }

    /// Map TLBR boxes from padded detector space back into source-frame space.
    pub fn unpad_boxes(&self, boxes: &mut [[f32; 4]]) {
        let scale_x = self.original_size.0 as f32 / self.resized_size.0.max(1) as f32;
        let scale_y = self.original_size.1 as f32 / self.resized_size.1.max(1) as f32;
        let (left, top) = (self.left_pad as f32, self.top_pad as f32);

        for b in boxes.iter_mut() {
            b[0] = (b[0] - left) * scale_x;
            b[2] = (b[2] - left) * scale_x;
            b[1] = (b[1] - top) * scale_y;
            b[3] = (b[3] - top) * scale_y;
        }
    }
}
