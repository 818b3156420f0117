//! GPU-facing view of grid state.

use cellsynth_core::{Cell, CellObserver, FrequencyRange, GenerationSummary, Grid};

/// Number of `f32` channels stored per cell.
pub const CHANNELS: usize = 4;

/// Row-major RGBA texels mirroring the grid, one per cell.
///
/// Channels: amplitude, log-normalised frequency, an unused slot kept at zero,
/// and an alive flag. The buffer stays in sync by observing the grid, so only
/// changed cells are rewritten.
#[derive(Debug, Clone)]
pub struct CellStateBuffer {
    width: u32,
    height: u32,
    log_min: f32,
    log_span: f32,
    texels: Vec<[f32; CHANNELS]>,
    generation: u64,
    dirty: bool,
}

impl CellStateBuffer {
    /// An all-zero buffer for a `width × height` grid.
    #[must_use]
    pub fn new(width: u32, height: u32, range: FrequencyRange) -> Self {
        let log_min = range.min_hz.log2();
        let log_span = (range.max_hz.log2() - log_min).max(f32::EPSILON);
        Self {
            width,
            height,
            log_min,
            log_span,
            texels: vec![[0.0; CHANNELS]; width as usize * height as usize],
            generation: 0,
            dirty: false,
        }
    }

    /// A buffer populated from the grid's current committed state.
    #[must_use]
    pub fn from_grid(grid: &Grid) -> Self {
        let mut buffer = Self::new(grid.width(), grid.height(), grid.config().frequency_range);
        for cell in grid.cells() {
            buffer.write(cell);
        }
        buffer.generation = grid.generation();
        buffer
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Generation of the last summary observed.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn texel(&self, x: u32, y: u32) -> Option<[f32; CHANNELS]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.texels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    #[must_use]
    pub fn texels(&self) -> &[[f32; CHANNELS]] {
        &self.texels
    }

    /// Flat view suitable for a storage-buffer upload.
    #[must_use]
    pub fn as_flat(&self) -> &[f32] {
        self.texels.as_flattened()
    }

    /// Raw bytes of [`Self::as_flat`], ready for a queue write.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.as_flat())
    }

    /// Returns whether anything changed since the last call, clearing the flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn normalized_frequency(&self, hz: f32) -> f32 {
        if !hz.is_finite() || hz <= 0.0 {
            return 0.0;
        }
        ((hz.log2() - self.log_min) / self.log_span).clamp(0.0, 1.0)
    }

    fn write(&mut self, cell: &Cell) {
        let position = cell.position();
        let index = position.y as usize * self.width as usize + position.x as usize;
        let texel = [
            cell.amplitude(),
            self.normalized_frequency(cell.frequency()),
            0.0,
            if cell.is_alive() { 1.0 } else { 0.0 },
        ];
        if let Some(slot) = self.texels.get_mut(index) {
            *slot = texel;
            self.dirty = true;
        }
    }
}

impl CellObserver for CellStateBuffer {
    fn on_cell_changed(&mut self, cell: &Cell) {
        self.write(cell);
    }

    fn on_generation(&mut self, summary: &GenerationSummary) {
        self.generation = summary.generation;
    }
}
