use crate::util::*;

pub trait CCfloat {
    fn float(&self) -> float;
}
macro_rules! impl_ccfloat {
    ($($t:ty),*) => {
        $(
            impl CCfloat for $t {
                #[inline]
                fn float(&self) -> float {
                    *self as float
                }
            }
        )*
    };
}
impl_ccfloat!(usize, u32, u64, i32, i64, f32, f64);

pub trait CCuint {
    fn uint(&self) -> uint;
}
impl CCuint for usize {
    #[inline]
    fn uint(&self) -> uint {
        *self as uint
    }
}
