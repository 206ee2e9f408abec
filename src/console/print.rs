//! Display styling for the operator console.

pub mod style {
    use crossterm::style::{Color, Stylize};
    use std::fmt::{Display, Formatter};

    struct View<T: Display> {
        inner: T,
        color: Color,
    }

    impl<T: Display> Display for View<T> {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            let text = self.inner.to_string();
            f.write_fmt(format_args!("{}", text.with(self.color)))
        }
    }

    /// Construct structure declaration to display data of the same type
    /// (errors, endpoints, etc.).
    macro_rules! view_struct {
        ($name: ident, $color: expr) => {
            pub struct $name<T: Display>(View<T>);

            impl<T: Display> From<T> for $name<T> {
                fn from(value: T) -> Self {
                    Self(View {
                        inner: value,
                        color: $color,
                    })
                }
            }

            impl<T: Display> Display for $name<T> {
                fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                    self.0.fmt(f)
                }
            }
        };
    }

    view_struct!(ErrorView, Color::Red);
    view_struct!(EndpointView, Color::Green);
    view_struct!(BannerView, Color::Cyan);
}
