//! Fast-marching inpainting.
//!
//! Damaged pixels are filled in order of their distance to the hole
//! boundary. Each pixel is reconstructed from already-known pixels within a
//! small radius; the two variants only differ in how those neighbours are
//! weighted.

use std::{cmp::Ordering, collections::BinaryHeap};

use image::{GrayImage, RgbImage};

const INFINITE_DISTANCE: f32 = 1.0e6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Known,
    Band,
    Inside,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weighting {
    /// Telea: distance, level-set and direction terms plus gradient correction.
    Telea,
    /// Neighbours aligned with the isophote (edge continuation) dominate.
    Isophote,
}

#[derive(Debug, Clone, Copy)]
struct BandPixel {
    distance: f32,
    x: usize,
    y: usize,
}

impl PartialEq for BandPixel {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for BandPixel {}

impl Ord for BandPixel {
    // Reversed so the heap pops the smallest distance first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.y.cmp(&self.y))
            .then_with(|| other.x.cmp(&self.x))
    }
}

impl PartialOrd for BandPixel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Field {
    width: usize,
    height: usize,
    state: Vec<State>,
    distance: Vec<f32>,
    pixels: Vec<[f32; 3]>,
}

impl Field {
    fn new(image: &RgbImage, mask: &GrayImage) -> Self {
        let (width, height) = (image.width() as usize, image.height() as usize);
        let mut state = vec![State::Known; width * height];
        let mut distance = vec![0.0; width * height];

        for (x, y, pixel) in mask.enumerate_pixels() {
            if pixel[0] > 0 {
                let idx = y as usize * width + x as usize;
                state[idx] = State::Inside;
                distance[idx] = INFINITE_DISTANCE;
            }
        }

        let pixels = image
            .pixels()
            .map(|p| [p[0] as f32, p[1] as f32, p[2] as f32])
            .collect();

        Self {
            width,
            height,
            state,
            distance,
            pixels,
        }
    }

    fn index(&self, x: isize, y: isize) -> Option<usize> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            None
        } else {
            Some(y as usize * self.width + x as usize)
        }
    }

    /// Out-of-frame pixels count as unknown.
    fn is_known(&self, x: isize, y: isize) -> bool {
        self.index(x, y)
            .map(|i| self.state[i] != State::Inside)
            .unwrap_or(false)
    }

    fn t(&self, x: isize, y: isize) -> f32 {
        self.index(x, y)
            .map(|i| self.distance[i])
            .unwrap_or(INFINITE_DISTANCE)
    }

    /// Known pixels touching the hole form the initial narrow band.
    fn initial_band(&mut self) -> BinaryHeap<BandPixel> {
        let mut heap = BinaryHeap::new();

        for y in 0..self.height {
            for x in 0..self.width {
                if self.state[y * self.width + x] != State::Known {
                    continue;
                }
                let touches_hole = NEIGHBOURS.iter().any(|(dx, dy)| {
                    self.index(x as isize + dx, y as isize + dy)
                        .map(|i| self.state[i] == State::Inside)
                        .unwrap_or(false)
                });
                if touches_hole {
                    self.state[y * self.width + x] = State::Band;
                    heap.push(BandPixel {
                        distance: 0.0,
                        x,
                        y,
                    });
                }
            }
        }

        heap
    }

    fn solve(&self, x1: isize, y1: isize, x2: isize, y2: isize) -> f32 {
        let a = self.t(x1, y1);
        let b = self.t(x2, y2);
        let smaller = a.min(b);

        match (self.is_known(x1, y1), self.is_known(x2, y2)) {
            (true, true) => {
                if (a - b).abs() >= 1.0 {
                    1.0 + smaller
                } else {
                    (a + b + (2.0 - (a - b) * (a - b)).sqrt()) * 0.5
                }
            }
            (true, false) => 1.0 + a,
            (false, true) => 1.0 + b,
            (false, false) => 1.0 + smaller,
        }
    }

    fn arrival_time(&self, x: isize, y: isize) -> f32 {
        self.solve(x - 1, y, x, y - 1)
            .min(self.solve(x + 1, y, x, y - 1))
            .min(self.solve(x - 1, y, x, y + 1))
            .min(self.solve(x + 1, y, x, y + 1))
    }

    fn distance_gradient(&self, x: isize, y: isize) -> (f32, f32) {
        let centre = self.t(x, y);
        let axis = |prev: (isize, isize), next: (isize, isize)| -> f32 {
            match (self.is_known(prev.0, prev.1), self.is_known(next.0, next.1)) {
                (true, true) => (self.t(next.0, next.1) - self.t(prev.0, prev.1)) * 0.5,
                (false, true) => self.t(next.0, next.1) - centre,
                (true, false) => centre - self.t(prev.0, prev.1),
                (false, false) => 0.0,
            }
        };

        (
            axis((x - 1, y), (x + 1, y)),
            axis((x, y - 1), (x, y + 1)),
        )
    }

    fn value(&self, x: isize, y: isize, channel: usize) -> f32 {
        self.index(x, y).map(|i| self.pixels[i][channel]).unwrap_or(0.0)
    }

    fn intensity_gradient(&self, x: isize, y: isize, channel: usize) -> (f32, f32) {
        let centre = self.value(x, y, channel);
        let axis = |prev: (isize, isize), next: (isize, isize)| -> f32 {
            match (self.is_known(prev.0, prev.1), self.is_known(next.0, next.1)) {
                (true, true) => {
                    (self.value(next.0, next.1, channel) - self.value(prev.0, prev.1, channel))
                        * 0.5
                }
                (false, true) => self.value(next.0, next.1, channel) - centre,
                (true, false) => centre - self.value(prev.0, prev.1, channel),
                (false, false) => 0.0,
            }
        };

        (
            axis((x - 1, y), (x + 1, y)),
            axis((x, y - 1), (x, y + 1)),
        )
    }

    fn reconstruct(&self, x: isize, y: isize, radius: isize, weighting: Weighting) -> [f32; 3] {
        let grad_t = self.distance_gradient(x, y);
        let t_here = self.t(x, y);
        let mut result = [0.0f32; 3];

        for (channel, out) in result.iter_mut().enumerate() {
            let mut sum = 0.0f32;
            let mut weight_sum = 1.0e-20f32;
            let mut jx = 0.0f32;
            let mut jy = 0.0f32;

            for ny in (y - radius)..=(y + radius) {
                for nx in (x - radius)..=(x + radius) {
                    if !self.is_known(nx, ny) {
                        continue;
                    }
                    let (rx, ry) = ((x - nx) as f32, (y - ny) as f32);
                    let length_sq = rx * rx + ry * ry;
                    if length_sq == 0.0 || length_sq > (radius * radius) as f32 {
                        continue;
                    }

                    let dst = 1.0 / (length_sq * length_sq.sqrt());
                    let lev = 1.0 / (1.0 + (self.t(nx, ny) - t_here).abs());
                    let grad_i = self.intensity_gradient(nx, ny, channel);

                    let weight = match weighting {
                        Weighting::Telea => {
                            let mut dir = rx * grad_t.0 + ry * grad_t.1;
                            if dir.abs() <= 0.01 {
                                dir = 1.0e-6;
                            }
                            (dst * lev * dir).abs()
                        }
                        Weighting::Isophote => {
                            let grad_len = (grad_i.0 * grad_i.0 + grad_i.1 * grad_i.1).sqrt();
                            let alignment = if grad_len < 1.0e-3 {
                                1.0
                            } else {
                                // isophote direction is the gradient rotated by 90 degrees
                                (rx * -grad_i.1 + ry * grad_i.0).abs()
                                    / (length_sq.sqrt() * grad_len)
                            };
                            dst * lev * (alignment + 1.0e-3)
                        }
                    };

                    let value = self.value(nx, ny, channel);
                    if weighting == Weighting::Telea {
                        jx -= weight * grad_i.0 * rx;
                        jy -= weight * grad_i.1 * ry;
                    }
                    sum += weight * value;
                    weight_sum += weight;
                }
            }

            let mut estimate = sum / weight_sum;
            let j_norm = (jx * jx + jy * jy).sqrt();
            // below this the correction is float noise from reconstructed flats
            if weighting == Weighting::Telea && j_norm > 1.0e-2 {
                estimate += (jx + jy) / j_norm;
            }
            *out = estimate.clamp(0.0, 255.0);
        }

        result
    }

    fn march(&mut self, radius: isize, weighting: Weighting) {
        let mut heap = self.initial_band();

        while let Some(current) = heap.pop() {
            let idx = current.y * self.width + current.x;
            if self.state[idx] == State::Known {
                continue;
            }
            self.state[idx] = State::Known;

            for (dx, dy) in NEIGHBOURS {
                let (nx, ny) = (current.x as isize + dx, current.y as isize + dy);
                let Some(n_idx) = self.index(nx, ny) else {
                    continue;
                };
                if self.state[n_idx] != State::Inside {
                    continue;
                }

                self.distance[n_idx] = self.arrival_time(nx, ny);
                self.pixels[n_idx] = self.reconstruct(nx, ny, radius, weighting);
                self.state[n_idx] = State::Band;
                heap.push(BandPixel {
                    distance: self.distance[n_idx],
                    x: nx as usize,
                    y: ny as usize,
                });
            }
        }
    }

    fn into_image(self) -> RgbImage {
        let mut raw = Vec::with_capacity(self.pixels.len() * 3);
        for pixel in &self.pixels {
            raw.extend(pixel.iter().map(|v| v.round() as u8));
        }
        RgbImage::from_raw(self.width as u32, self.height as u32, raw)
            .unwrap_or_else(|| RgbImage::new(self.width as u32, self.height as u32))
    }
}

const NEIGHBOURS: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Fills every non-zero mask pixel; `mask` must match `image` in size.
pub fn inpaint(image: &RgbImage, mask: &GrayImage, radius: u32, weighting: Weighting) -> RgbImage {
    if !mask.pixels().any(|p| p[0] > 0) {
        return image.clone();
    }

    let mut field = Field::new(image, mask);
    field.march(radius.max(1) as isize, weighting);

    // Known pixels pass through untouched.
    let mut output = field.into_image();
    for (x, y, pixel) in mask.enumerate_pixels() {
        if pixel[0] == 0 {
            output.put_pixel(x, y, *image.get_pixel(x, y));
        }
    }
    output
}
