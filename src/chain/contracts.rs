use ethers::prelude::*;

// Read-only slice of ERC-20; nothing else is ever called.
abigen!(
    Erc20,
    r#"[
        function balanceOf(address owner) external view returns (uint256)
        function decimals() external view returns (uint8)
    ]"#
);
