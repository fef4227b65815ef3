use crate::Error;
use crate::border::{BorderMode, map_index};
use crate::image::ImageView;

/// Per-pixel intensity access used by the contour image force.
///
/// Implementations must answer for any integer coordinate; reads outside the
/// raster follow whatever border policy the implementation chooses.
pub trait IntensitySampler {
    fn intensity(&self, x: i32, y: i32) -> u8;
}

impl<F> IntensitySampler for F
where
    F: Fn(i32, i32) -> u8,
{
    fn intensity(&self, x: i32, y: i32) -> u8 {
        self(x, y)
    }
}

/// An 8-bit view paired with the border policy used for out-of-range reads.
#[derive(Debug, Clone, Copy)]
pub struct BorderedView<'a> {
    view: ImageView<'a, u8>,
    border: BorderMode<u8>,
}

impl<'a> BorderedView<'a> {
    pub fn new(view: ImageView<'a, u8>, border: BorderMode<u8>) -> Result<Self, Error> {
        if view.is_empty() {
            return Err(Error::EmptyImage {
                width: view.width(),
                height: view.height(),
            });
        }
        Ok(Self { view, border })
    }

    pub fn view(&self) -> &ImageView<'a, u8> {
        &self.view
    }

    pub fn border(&self) -> BorderMode<u8> {
        self.border
    }
}

impl IntensitySampler for BorderedView<'_> {
    fn intensity(&self, x: i32, y: i32) -> u8 {
        sample_pixel(&self.view, x as isize, y as isize, self.border)
    }
}

pub fn sample_pixel<T: Copy>(img: &ImageView<'_, T>, xi: isize, yi: isize, border: BorderMode<T>) -> T {
    if img.is_empty() {
        if let BorderMode::Constant(v) = border {
            return v;
        }
        panic!("cannot sample an empty image with non-constant border");
    }

    match border {
        BorderMode::Constant(v) => {
            if xi < 0 || yi < 0 || xi >= img.width() as isize || yi >= img.height() as isize {
                return v;
            }
            // SAFETY: Bounds are checked immediately above.
            unsafe { *img.get_unchecked(xi as usize, yi as usize) }
        }
        mode @ (BorderMode::Clamp | BorderMode::Reflect101) => {
            let mx =
                map_index(xi, img.width(), &mode).expect("valid mapped index for non-empty image");
            let my =
                map_index(yi, img.height(), &mode).expect("valid mapped index for non-empty image");
            // SAFETY: `map_index` returns indices in `[0, len)` for non-empty images.
            unsafe { *img.get_unchecked(mx, my) }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::border::BorderMode;
    use crate::image::Image;
    use crate::sample::{BorderedView, IntensitySampler, sample_pixel};
    use crate::Error;

    fn grid() -> Image<u8> {
        Image::from_vec(
            3,
            3,
            vec![
                0u8, 1, 2, // row 0
                10, 11, 12, // row 1
                20, 21, 22, // row 2
            ],
        )
        .expect("valid image")
    }

    #[test]
    fn pixel_on_3x3_with_each_border() {
        let img = grid();
        let view = img.as_view();

        assert_eq!(sample_pixel(&view, 1, 2, BorderMode::Clamp), 21);
        assert_eq!(sample_pixel(&view, -2, 1, BorderMode::Clamp), 10);
        assert_eq!(sample_pixel(&view, 9, 9, BorderMode::Clamp), 22);
        assert_eq!(sample_pixel(&view, -1, 1, BorderMode::Constant(99u8)), 99);
        assert_eq!(sample_pixel(&view, 0, 0, BorderMode::Constant(99u8)), 0);
        assert_eq!(sample_pixel(&view, 3, 0, BorderMode::Reflect101), 1);
    }

    #[test]
    fn bordered_view_applies_policy_out_of_bounds() {
        let img = grid();

        let clamp = BorderedView::new(img.as_view(), BorderMode::Clamp).expect("non-empty");
        assert_eq!(clamp.intensity(-5, -5), 0);
        assert_eq!(clamp.intensity(50, 1), 12);

        let zero = BorderedView::new(img.as_view(), BorderMode::Constant(0)).expect("non-empty");
        assert_eq!(zero.intensity(50, 1), 0);
        assert_eq!(zero.intensity(1, 1), 11);
    }

    #[test]
    fn bordered_view_rejects_empty_image() {
        let img = Image::<u8>::new_fill(0, 4, 0);
        let err = BorderedView::new(img.as_view(), BorderMode::Clamp).expect_err("empty");
        assert_eq!(
            err,
            Error::EmptyImage {
                width: 0,
                height: 4
            }
        );
    }

    #[test]
    fn closures_are_samplers() {
        let stripes = |x: i32, _y: i32| -> u8 { if x >= 0 { 255 } else { 0 } };
        assert_eq!(stripes.intensity(3, 0), 255);
        assert_eq!(stripes.intensity(-1, 0), 0);
    }
}
