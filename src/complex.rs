#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Complex<T> {
    pub re: T,
    pub im: T,
}

impl<T> Complex<T> {
    pub fn new(re: T, im: T) -> Self {
        Self { re, im }
    }
}

/// The type of raw IQ samples out of the SDR
pub type ComplexByte = Complex<i8>;

fn square_byte(byte: i8) -> u32 {
    byte.unsigned_abs() as u32 * byte.unsigned_abs() as u32
}

impl ComplexByte {
    /// Instantaneous power, |re|^2 + |im|^2
    pub fn norm_sq(self) -> u32 {
        square_byte(self.re) + square_byte(self.im)
    }
}
