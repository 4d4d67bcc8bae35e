pub mod implicit_line;
pub mod point_to_line;
pub mod point_to_plane;
pub mod residual;
pub mod se3;
pub mod so3;
