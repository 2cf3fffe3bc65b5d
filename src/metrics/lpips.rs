//! LPIPS perceptual distance on AlexNet features, evaluated on the CPU.
//!
//! Weights come from a safetensors export of the LPIPS(alex) state dict:
//! `net.slice{n}.{i}.weight|bias` for the five convolutions and
//! `lin{n}.model.1.weight` for the per-layer channel weights.

use std::{fs, path::Path};

use image::RgbImage;
use ndarray::{Array1, Array2, Array3, Axis};
use safetensors::{Dtype, SafeTensors};

use crate::{
    error::{RestorationError, Result},
    metrics::PerceptualMetric,
};

const SHIFT: [f32; 3] = [-0.030, -0.088, -0.188];
const SCALE: [f32; 3] = [0.458, 0.448, 0.450];
const NORM_EPS: f32 = 1e-10;

/// (tensor prefix, kernel, stride, padding, max-pool before the convolution)
const ALEXNET: [(&str, usize, usize, usize, bool); 5] = [
    ("net.slice1.0", 11, 4, 2, false),
    ("net.slice2.3", 5, 1, 2, true),
    ("net.slice3.6", 3, 1, 1, true),
    ("net.slice4.8", 3, 1, 1, false),
    ("net.slice5.10", 3, 1, 1, false),
];

pub struct Conv2d {
    weight: Array2<f32>,
    bias: Array1<f32>,
    in_channels: usize,
    kernel: usize,
    stride: usize,
    padding: usize,
}

impl Conv2d {
    pub fn new(
        weight: Array2<f32>,
        bias: Array1<f32>,
        kernel: usize,
        stride: usize,
        padding: usize,
    ) -> Result<Self> {
        let (out_channels, patch) = weight.dim();
        if bias.len() != out_channels || kernel == 0 || patch % (kernel * kernel) != 0 {
            return Err(RestorationError::Model(format!(
                "inconsistent convolution: weight {out_channels}x{patch}, bias {}, kernel {kernel}",
                bias.len()
            )));
        }

        Ok(Self {
            in_channels: patch / (kernel * kernel),
            weight,
            bias,
            kernel,
            stride: stride.max(1),
            padding,
        })
    }

    pub fn out_channels(&self) -> usize {
        self.weight.nrows()
    }

    /// Convolution via im2col and a single matrix product; input is (C, H, W).
    pub fn forward(&self, input: &Array3<f32>) -> Result<Array3<f32>> {
        let (channels, height, width) = input.dim();
        if channels != self.in_channels {
            return Err(RestorationError::Model(format!(
                "expected {} input channels, got {channels}",
                self.in_channels
            )));
        }
        let (k, s, p) = (self.kernel, self.stride, self.padding);
        if height + 2 * p < k || width + 2 * p < k {
            return Err(RestorationError::Model(format!(
                "input {width}x{height} smaller than kernel {k}"
            )));
        }

        let out_h = (height + 2 * p - k) / s + 1;
        let out_w = (width + 2 * p - k) / s + 1;
        let mut columns = Array2::<f32>::zeros((channels * k * k, out_h * out_w));

        for c in 0..channels {
            for ky in 0..k {
                for kx in 0..k {
                    let row = (c * k + ky) * k + kx;
                    for oy in 0..out_h {
                        let iy = (oy * s + ky) as isize - p as isize;
                        if iy < 0 || iy as usize >= height {
                            continue;
                        }
                        for ox in 0..out_w {
                            let ix = (ox * s + kx) as isize - p as isize;
                            if ix < 0 || ix as usize >= width {
                                continue;
                            }
                            columns[[row, oy * out_w + ox]] = input[[c, iy as usize, ix as usize]];
                        }
                    }
                }
            }
        }

        let mut output = self.weight.dot(&columns);
        output += &self.bias.view().insert_axis(Axis(1));

        output
            .into_shape_with_order((self.out_channels(), out_h, out_w))
            .map_err(|e| RestorationError::Model(e.to_string()))
    }
}

pub struct FeatureLayer {
    pub conv: Conv2d,
    pub pool_before: bool,
    pub channel_weights: Array1<f32>,
}

pub struct LpipsModel {
    layers: Vec<FeatureLayer>,
}

impl LpipsModel {
    pub fn new(layers: Vec<FeatureLayer>) -> Result<Self> {
        if layers.is_empty() {
            return Err(RestorationError::Model("no feature layers".into()));
        }
        for layer in &layers {
            if layer.channel_weights.len() != layer.conv.out_channels() {
                return Err(RestorationError::Model(
                    "channel weights do not match layer width".into(),
                ));
            }
        }
        Ok(Self { layers })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path.as_ref())?;
        Self::from_safetensors(&bytes)
    }

    pub fn from_safetensors(bytes: &[u8]) -> Result<Self> {
        let tensors =
            SafeTensors::deserialize(bytes).map_err(|e| RestorationError::Model(e.to_string()))?;

        let mut layers = Vec::with_capacity(ALEXNET.len());
        for (index, (prefix, kernel, stride, padding, pool_before)) in ALEXNET.iter().enumerate() {
            let (weight_shape, weight) = read_tensor(&tensors, &format!("{prefix}.weight"))?;
            let (_, bias) = read_tensor(&tensors, &format!("{prefix}.bias"))?;
            let (_, lin) = read_tensor(&tensors, &format!("lin{index}.model.1.weight"))?;

            let out_channels = weight_shape.first().copied().unwrap_or(0);
            let patch = weight.len() / out_channels.max(1);
            let weight = Array2::from_shape_vec((out_channels, patch), weight)
                .map_err(|e| RestorationError::Model(e.to_string()))?;

            layers.push(FeatureLayer {
                conv: Conv2d::new(weight, Array1::from(bias), *kernel, *stride, *padding)?,
                pool_before: *pool_before,
                channel_weights: Array1::from(lin),
            });
        }

        Self::new(layers)
    }

    /// Per-layer channel-normalized activations.
    fn features(&self, image: &RgbImage) -> Result<Vec<Array3<f32>>> {
        let mut x = to_tensor(image);
        let mut features = Vec::with_capacity(self.layers.len());

        for layer in &self.layers {
            if layer.pool_before {
                x = max_pool(&x, 3, 2);
            }
            x = layer.conv.forward(&x)?;
            x.mapv_inplace(|v| v.max(0.0));
            features.push(normalize_channels(&x));
        }

        Ok(features)
    }
}

impl PerceptualMetric for LpipsModel {
    fn distance(&self, reference: &RgbImage, candidate: &RgbImage) -> Result<f64> {
        if reference.dimensions() != candidate.dimensions() {
            return Err(RestorationError::DimensionMismatch {
                expected: reference.dimensions(),
                actual: candidate.dimensions(),
            });
        }

        let a = self.features(reference)?;
        let b = self.features(candidate)?;

        let mut total = 0.0f64;
        for ((fa, fb), layer) in a.iter().zip(b.iter()).zip(self.layers.iter()) {
            let (channels, height, width) = fa.dim();
            let mut layer_sum = 0.0f64;
            for c in 0..channels {
                let w = layer.channel_weights[c] as f64;
                for y in 0..height {
                    for x in 0..width {
                        let d = (fa[[c, y, x]] - fb[[c, y, x]]) as f64;
                        layer_sum += w * d * d;
                    }
                }
            }
            total += layer_sum / (height * width) as f64;
        }

        Ok(total)
    }
}

fn read_tensor(tensors: &SafeTensors<'_>, name: &str) -> Result<(Vec<usize>, Vec<f32>)> {
    let view = tensors
        .tensor(name)
        .map_err(|e| RestorationError::Model(format!("{name}: {e}")))?;

    if view.dtype() != Dtype::F32 {
        return Err(RestorationError::Model(format!(
            "{name}: expected f32, found {:?}",
            view.dtype()
        )));
    }

    let values = view
        .data()
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    Ok((view.shape().to_vec(), values))
}

/// RGB in [0, 255] -> LPIPS input: scaled to [-1, 1], then shifted and scaled per channel.
pub fn to_tensor(image: &RgbImage) -> Array3<f32> {
    let (width, height) = image.dimensions();
    let mut tensor = Array3::zeros((3, height as usize, width as usize));

    for (x, y, pixel) in image.enumerate_pixels() {
        for c in 0..3 {
            let v = pixel[c] as f32 / 127.5 - 1.0;
            tensor[[c, y as usize, x as usize]] = (v - SHIFT[c]) / SCALE[c];
        }
    }

    tensor
}

fn max_pool(input: &Array3<f32>, size: usize, stride: usize) -> Array3<f32> {
    let (channels, height, width) = input.dim();
    if height < size || width < size {
        return input.clone();
    }
    let out_h = (height - size) / stride + 1;
    let out_w = (width - size) / stride + 1;
    let mut output = Array3::from_elem((channels, out_h, out_w), f32::NEG_INFINITY);

    for c in 0..channels {
        for oy in 0..out_h {
            for ox in 0..out_w {
                let mut best = f32::NEG_INFINITY;
                for dy in 0..size {
                    for dx in 0..size {
                        best = best.max(input[[c, oy * stride + dy, ox * stride + dx]]);
                    }
                }
                output[[c, oy, ox]] = best;
            }
        }
    }

    output
}

fn normalize_channels(input: &Array3<f32>) -> Array3<f32> {
    let norms = input.mapv(|v| v * v).sum_axis(Axis(0)).mapv(f32::sqrt);
    let mut output = input.clone();

    for mut channel in output.axis_iter_mut(Axis(0)) {
        channel.zip_mut_with(&norms, |v, &n| *v /= n + NORM_EPS);
    }

    output
}
