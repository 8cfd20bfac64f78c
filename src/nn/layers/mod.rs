pub mod conv;
pub mod flatten;
pub mod linear;
pub mod maxpool;
pub mod relu;
pub mod sequential;

pub use conv::Conv2d;
pub use flatten::Flatten;
pub use linear::Linear;
pub use maxpool::MaxPool2d;
pub use relu::ReLU;
pub use sequential::Sequential;
