pub mod fast_marching;
pub mod generative;

use image::{GrayImage, RgbImage};

use crate::{
    error::{RestorationError, Result},
    inpaint::fast_marching::Weighting,
    naming::RestorationMethod,
};

/// Anything that can fill the marked pixels of a damaged image.
pub trait Inpainter: Send + Sync {
    fn method(&self) -> RestorationMethod;

    fn inpaint(&self, image: &RgbImage, mask: &GrayImage) -> Result<RgbImage>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassicalMethod {
    Telea,
    NavierStokes,
}

impl ClassicalMethod {
    fn weighting(&self) -> Weighting {
        match self {
            ClassicalMethod::Telea => Weighting::Telea,
            ClassicalMethod::NavierStokes => Weighting::Isophote,
        }
    }
}

pub struct ClassicalInpainter {
    method: ClassicalMethod,
    radius: u32,
}

impl ClassicalInpainter {
    pub fn new(method: ClassicalMethod, radius: u32) -> Self {
        Self { method, radius }
    }

    pub fn telea(radius: u32) -> Self {
        Self::new(ClassicalMethod::Telea, radius)
    }

    pub fn navier_stokes(radius: u32) -> Self {
        Self::new(ClassicalMethod::NavierStokes, radius)
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }
}

impl Inpainter for ClassicalInpainter {
    fn method(&self) -> RestorationMethod {
        match self.method {
            ClassicalMethod::Telea => RestorationMethod::Telea,
            ClassicalMethod::NavierStokes => RestorationMethod::NavierStokes,
        }
    }

    fn inpaint(&self, image: &RgbImage, mask: &GrayImage) -> Result<RgbImage> {
        check_dimensions(image, mask)?;
        Ok(fast_marching::inpaint(
            image,
            mask,
            self.radius,
            self.method.weighting(),
        ))
    }
}

pub fn check_dimensions(image: &RgbImage, mask: &GrayImage) -> Result<()> {
    if image.dimensions() != mask.dimensions() {
        return Err(RestorationError::DimensionMismatch {
            expected: image.dimensions(),
            actual: mask.dimensions(),
        });
    }
    Ok(())
}

/// The Telea / Navier-Stokes pair written to the traditional results.
pub fn classical_pair(radius: u32) -> Vec<Box<dyn Inpainter>> {
    vec![
        Box::new(ClassicalInpainter::telea(radius)),
        Box::new(ClassicalInpainter::navier_stokes(radius)),
    ]
}
